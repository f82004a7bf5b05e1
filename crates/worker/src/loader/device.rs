//! On-device photo index loader.
//!
//! The device index itself (EXIF scanning, directory walking, persistence)
//! belongs to the host; this loader only consumes its query contract through
//! the [`DeviceIndex`] port: one paginated, bounds-filtered query, terminal
//! after the first response.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vantage_core::{
  geo::{Bounds, Coordinate, normalize_bearing},
  photo::{PhotoRecord, SizeVariant},
  source::{SourceConfig, SourceId},
};

use super::{LoadError, LoaderContext, LoaderSink, SourceLoader};

// ============================================================================
// Query contract
// ============================================================================

/// One page request against the device index, in its native camelCase wire
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePhotoQuery {
  pub page: usize,
  pub page_size: usize,
  pub min_lat: f64,
  pub max_lat: f64,
  pub min_lng: f64,
  pub max_lng: f64,
}

/// A photo record in the device index's native shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePhotoRecord {
  pub id: String,
  pub filename: String,
  pub path: String,
  pub latitude: f64,
  pub longitude: f64,
  pub altitude: Option<f64>,
  pub bearing: Option<f64>,
  /// Capture time, Unix seconds.
  pub timestamp: i64,
  /// GPS accuracy in meters.
  pub accuracy: f64,
  pub width: u32,
  pub height: u32,
  pub file_size: u64,
  pub created_at: i64,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePhotoPage {
  pub photos: Vec<DevicePhotoRecord>,
  pub total_count: usize,
  pub has_more: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceIndexError {
  #[error("device index unavailable: {0}")]
  Unavailable(String),
  #[error("device query failed: {0}")]
  Query(String),
}

/// Port to the host's on-device photo index.
#[async_trait]
pub trait DeviceIndex: Send + Sync {
  async fn query_photos(&self, query: DevicePhotoQuery) -> Result<DevicePhotoPage, DeviceIndexError>;
}

// ============================================================================
// Loader
// ============================================================================

pub struct DeviceLoader {
  source: SourceConfig,
  index: Arc<dyn DeviceIndex>,
  page_size: usize,
}

impl DeviceLoader {
  pub fn new(source: SourceConfig, ctx: &LoaderContext) -> Self {
    let page_size = source
      .max_photos
      .map_or(ctx.loading.device_page_size, |max| max.min(ctx.loading.device_page_size));
    Self {
      source,
      index: ctx.device.clone(),
      page_size,
    }
  }

  /// Convert a device record, filtering against the precise bounds in the
  /// same pass.
  fn convert(&self, record: DevicePhotoRecord, bounds: &Bounds) -> Option<PhotoRecord> {
    let coord = Coordinate::new(record.latitude, record.longitude);
    if !bounds.contains(&coord) {
      return None;
    }
    let mut sizes = HashMap::new();
    sizes.insert(
      "original".to_string(),
      SizeVariant {
        url: record.path,
        width: record.width,
        height: record.height,
      },
    );
    Some(PhotoRecord {
      id: record.id,
      source_id: self.source.id.clone(),
      coord,
      bearing: normalize_bearing(record.bearing.unwrap_or(0.0)),
      altitude: record.altitude.unwrap_or(0.0),
      captured_at: DateTime::from_timestamp(record.timestamp, 0),
      sizes,
      creator: None,
    })
  }
}

#[async_trait]
impl SourceLoader for DeviceLoader {
  fn source_id(&self) -> &SourceId {
    &self.source.id
  }

  async fn load(
    &self,
    bounds: Option<&Bounds>,
    sink: &LoaderSink,
    cancel: &CancellationToken,
  ) -> Result<(), LoadError> {
    let Some(bounds) = bounds else {
      debug!(source_id = %self.source.id, "No viewport yet, skipping device query");
      return Ok(());
    };

    // A wrapping viewport cannot be expressed as one min/max pair; query the
    // full longitude span and rely on the precise containment filter below.
    let (min_lng, max_lng) = if bounds.wraps_antimeridian() {
      (-180.0, 180.0)
    } else {
      (bounds.top_left.lng, bounds.bottom_right.lng)
    };

    let query = DevicePhotoQuery {
      page: 0,
      page_size: self.page_size,
      min_lat: bounds.bottom_right.lat,
      max_lat: bounds.top_left.lat,
      min_lng,
      max_lng,
    };

    let page = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(LoadError::Aborted),
      result = self.index.query_photos(query) => result.map_err(|e| LoadError::Device(e.to_string()))?,
    };
    if let Some(error) = page.error {
      return Err(LoadError::Device(error));
    }

    let received = page.photos.len();
    let records: Vec<PhotoRecord> = page
      .photos
      .into_iter()
      .filter_map(|record| self.convert(record, bounds))
      .collect();

    debug!(
      source_id = %self.source.id,
      received,
      in_bounds = records.len(),
      total = page.total_count,
      has_more = page.has_more,
      "Device query complete"
    );

    if page.total_count > 0 {
      sink.progress((received as f32 / page.total_count as f32).min(1.0)).await;
    }
    sink.batch(records).await;
    Ok(())
  }
}
