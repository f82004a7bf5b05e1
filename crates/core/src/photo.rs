//! Photo records as merged from all configured sources.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{geo::Coordinate, source::SourceId};

/// One named rendition of a photo (thumbnail, original, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeVariant {
  pub url: String,
  pub width: u32,
  pub height: u32,
}

/// Reference to the account that captured or uploaded a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorRef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
}

/// A single geolocated photo.
///
/// Identity is the pair `(source_id, id)`: ids are only unique within their
/// source, and cross-source duplicates are deliberately not collapsed here -
/// that is left to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
  pub id: String,
  pub source_id: SourceId,
  pub coord: Coordinate,
  /// Compass direction the camera faced, degrees in `[0, 360)`.
  pub bearing: f64,
  pub altitude: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub captured_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub sizes: HashMap<String, SizeVariant>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub creator: Option<CreatorRef>,
}

impl PhotoRecord {
  /// Whether two records describe the same photo (same id AND same source).
  pub fn same_photo(&self, other: &PhotoRecord) -> bool {
    self.id == other.id && self.source_id == other.source_id
  }
}
