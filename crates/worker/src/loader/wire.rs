//! Wire shape of remote photo records, shared by the streaming feed and
//! static documents.
//!
//! Coordinates arrive GeoJSON-style as `[lon, lat]`; bearings arrive as
//! `compass_angle` and are normalized on conversion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use vantage_core::{
  geo::{Coordinate, normalize_bearing},
  photo::{CreatorRef, PhotoRecord, SizeVariant},
  source::SourceId,
};

#[derive(Debug, Deserialize)]
pub(crate) struct WirePhoto {
  pub id: String,
  pub geometry: WireGeometry,
  #[serde(default)]
  pub compass_angle: f64,
  #[serde(default)]
  pub computed_altitude: f64,
  /// RFC3339 capture time; the feed sends an empty string for unknown.
  #[serde(default)]
  pub captured_at: Option<String>,
  #[serde(default)]
  pub sizes: HashMap<String, WireSize>,
  #[serde(default)]
  pub creator: Option<WireCreator>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireGeometry {
  /// `[lon, lat]`
  pub coordinates: [f64; 2],
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSize {
  pub url: String,
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCreator {
  pub id: String,
  #[serde(default)]
  pub username: Option<String>,
}

impl WirePhoto {
  pub(crate) fn into_record(self, source_id: &SourceId) -> PhotoRecord {
    let captured_at = self
      .captured_at
      .as_deref()
      .filter(|s| !s.is_empty())
      .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
      .map(|dt| dt.with_timezone(&Utc));

    let sizes = self
      .sizes
      .into_iter()
      .map(|(name, size)| {
        (
          name,
          SizeVariant {
            url: size.url,
            width: size.width,
            height: size.height,
          },
        )
      })
      .collect();

    PhotoRecord {
      id: self.id,
      source_id: source_id.clone(),
      coord: Coordinate::new(self.geometry.coordinates[1], self.geometry.coordinates[0]),
      bearing: normalize_bearing(self.compass_angle),
      altitude: self.computed_altitude,
      captured_at,
      sizes,
      creator: self.creator.map(|c| CreatorRef {
        id: c.id,
        username: c.username,
      }),
    }
  }
}
