//! Photo source configuration as delivered by the host.
//!
//! A config message supersedes the previous one wholesale; individual
//! `SourceConfig` entries are immutable once delivered.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

/// Identifier of a configured photo source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SourceId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// The kind of a photo source, which fixes how it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  /// Long-lived server-push feed, parameterized by the viewport.
  Stream,
  /// The on-device photo index, queried through an injected port.
  LocalDevice,
  /// A single fetch-once JSON document of photo records.
  StaticDocument,
}

impl SourceKind {
  /// Culling priority rank; lower ranks win per-cell contention.
  ///
  /// Device photos beat remote feeds, remote feeds beat static documents.
  /// Among sources of the same kind, config order decides.
  pub fn rank(self) -> u8 {
    match self {
      SourceKind::LocalDevice => 0,
      SourceKind::Stream => 1,
      SourceKind::StaticDocument => 2,
    }
  }
}

/// One source entry of a config message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
  pub id: SourceId,
  pub kind: SourceKind,
  pub enabled: bool,
  /// Feed or document URL; required for `Stream` and `StaticDocument`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  /// Optional cap on results requested from this source.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_photos: Option<usize>,
}

/// Malformed source configuration, rejected before any loader starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
  #[error("source id must not be empty")]
  EmptyId,
  #[error("duplicate source id: {0}")]
  DuplicateId(SourceId),
  #[error("source {id} ({kind:?}) requires an endpoint")]
  MissingEndpoint { id: SourceId, kind: SourceKind },
}

/// Validate a full config message.
pub fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
  let mut seen: HashSet<&SourceId> = HashSet::new();
  for source in sources {
    if source.id.as_str().is_empty() {
      return Err(ConfigError::EmptyId);
    }
    if !seen.insert(&source.id) {
      return Err(ConfigError::DuplicateId(source.id.clone()));
    }
    let needs_endpoint = matches!(source.kind, SourceKind::Stream | SourceKind::StaticDocument);
    if needs_endpoint && source.endpoint.as_deref().is_none_or(str::is_empty) {
      return Err(ConfigError::MissingEndpoint {
        id: source.id.clone(),
        kind: source.kind,
      });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn source(id: &str, kind: SourceKind, endpoint: Option<&str>) -> SourceConfig {
    SourceConfig {
      id: SourceId::new(id),
      kind,
      enabled: true,
      endpoint: endpoint.map(str::to_string),
      max_photos: None,
    }
  }

  #[test]
  fn test_validate_accepts_well_formed_config() {
    let sources = vec![
      source("skyfeed", SourceKind::Stream, Some("https://example.test/api/photos")),
      source("device", SourceKind::LocalDevice, None),
      source("seed", SourceKind::StaticDocument, Some("https://example.test/seed.json")),
    ];
    assert_eq!(validate_sources(&sources), Ok(()));
  }

  #[test]
  fn test_validate_rejects_duplicates() {
    let sources = vec![
      source("device", SourceKind::LocalDevice, None),
      source("device", SourceKind::LocalDevice, None),
    ];
    assert_eq!(
      validate_sources(&sources),
      Err(ConfigError::DuplicateId(SourceId::new("device")))
    );
  }

  #[test]
  fn test_validate_rejects_missing_endpoint() {
    let sources = vec![source("skyfeed", SourceKind::Stream, None)];
    assert!(matches!(
      validate_sources(&sources),
      Err(ConfigError::MissingEndpoint { .. })
    ));

    let sources = vec![source("seed", SourceKind::StaticDocument, Some(""))];
    assert!(matches!(
      validate_sources(&sources),
      Err(ConfigError::MissingEndpoint { .. })
    ));
  }

  #[test]
  fn test_validate_rejects_empty_id() {
    let sources = vec![source("", SourceKind::LocalDevice, None)];
    assert_eq!(validate_sources(&sources), Err(ConfigError::EmptyId));
  }

  #[test]
  fn test_rank_ordering() {
    assert!(SourceKind::LocalDevice.rank() < SourceKind::Stream.rank());
    assert!(SourceKind::Stream.rank() < SourceKind::StaticDocument.rank());
  }

  #[test]
  fn test_kind_serializes_snake_case() {
    let json = serde_json::to_string(&SourceKind::LocalDevice).expect("serialize");
    assert_eq!(json, "\"local_device\"");
  }
}
