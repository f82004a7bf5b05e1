//! Worker settings, supplied by the host at construction time.

use serde::{Deserialize, Serialize};

/// Spatial reduction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
  /// Grid dimension N for the N x N viewport partition.
  pub grid_dim: usize,
  /// Hard cap on photos emitted for the viewport.
  pub max_photos_in_area: usize,
  /// Hard cap on photos emitted for the 360-degree range set.
  pub max_photos_in_range: usize,
  /// Range radius in meters used when the host does not send one.
  pub default_range_m: f64,
}

impl Default for CullingConfig {
  fn default() -> Self {
    Self {
      grid_dim: 10,
      max_photos_in_area: 500,
      max_photos_in_range: 20,
      default_range_m: 150.0,
    }
  }
}

/// Source loading settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
  /// Ceiling on one auth-token round trip to the host, in seconds.
  pub auth_timeout_secs: u64,
  /// Connection failures inside this window, before any successful open,
  /// are treated as a possible stale credential.
  pub auth_retry_window_ms: u64,
  /// Page size for on-device index queries.
  pub device_page_size: usize,
}

impl Default for LoadingConfig {
  fn default() -> Self {
    Self {
      auth_timeout_secs: 5,
      auth_retry_window_ms: 1000,
      device_page_size: 500,
    }
  }
}

/// Full worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  pub culling: CullingConfig,
  pub loading: LoadingConfig,
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_defaults() {
    let config = WorkerConfig::default();
    assert_eq!(config.culling.grid_dim, 10);
    assert_eq!(config.culling.max_photos_in_area, 500);
    assert_eq!(config.culling.max_photos_in_range, 20);
    assert_eq!(config.loading.auth_timeout_secs, 5);
  }

  #[test]
  fn test_partial_deserialization_fills_defaults() {
    let config: WorkerConfig = serde_json::from_str(r#"{"culling":{"grid_dim":4}}"#).expect("parse");
    assert_eq!(config.culling.grid_dim, 4);
    assert_eq!(config.culling.max_photos_in_area, 500);
    assert_eq!(config.loading.device_page_size, 500);
  }
}
