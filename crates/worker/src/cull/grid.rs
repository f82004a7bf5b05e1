//! Stage 1 - grid-based area culling.
//!
//! The viewport is partitioned into a fixed N x N grid and every cell gets
//! an equal share of the global cap, so coverage spreads across the viewport
//! instead of clumping wherever one source happens to be dense.

use std::collections::BTreeMap;

use vantage_core::{
  geo::{Bounds, Coordinate},
  photo::PhotoRecord,
};

use super::SourcePhotos;

/// Geometry of the N x N partition of one viewport.
///
/// Pure geometry - holds no photos. Rebuilding it is cheap but pointless
/// when the bounds have not changed, so the culler caches it per bounds
/// update id.
#[derive(Debug, Clone)]
pub struct GridIndex {
  bounds: Bounds,
  dim: usize,
  cell_lat: f64,
  cell_lng: f64,
}

impl GridIndex {
  pub fn new(bounds: Bounds, dim: usize) -> Self {
    let dim = dim.max(1);
    Self {
      bounds,
      dim,
      cell_lat: bounds.lat_span() / dim as f64,
      cell_lng: bounds.lng_span() / dim as f64,
    }
  }

  pub fn bounds(&self) -> &Bounds {
    &self.bounds
  }

  /// Row-major cell index for a coordinate, `None` when outside the bounds.
  pub fn cell_of(&self, coord: &Coordinate) -> Option<usize> {
    if !self.bounds.contains(coord) {
      return None;
    }
    let row = if self.cell_lat > 0.0 {
      (((self.bounds.top_left.lat - coord.lat) / self.cell_lat) as usize).min(self.dim - 1)
    } else {
      0
    };
    // longitudinal offset measured along the span handles wrapping bounds
    let lng_offset = (coord.lng - self.bounds.top_left.lng).rem_euclid(360.0);
    let col = if self.cell_lng > 0.0 {
      ((lng_offset / self.cell_lng) as usize).min(self.dim - 1)
    } else {
      0
    };
    Some(row * self.dim + col)
  }
}

/// Select up to `cap` photos with per-cell fair shares.
///
/// `sources` must already be ordered by source priority (device first); the
/// per-cell candidate lists inherit that order, so when a cell exceeds its
/// share the higher-priority photos win.
pub fn cull_area(index: &GridIndex, sources: &[SourcePhotos<'_>], cap: usize) -> Vec<PhotoRecord> {
  if cap == 0 {
    return Vec::new();
  }

  let mut cells: BTreeMap<usize, Vec<&PhotoRecord>> = BTreeMap::new();
  for source in sources {
    for photo in &source.photos {
      if let Some(cell) = index.cell_of(&photo.coord) {
        cells.entry(cell).or_default().push(*photo);
      }
    }
  }
  if cells.is_empty() {
    return Vec::new();
  }

  let share = (cap / cells.len()).max(1);
  let mut selected = Vec::new();
  for candidates in cells.values() {
    for photo in candidates.iter().take(share) {
      if selected.len() >= cap {
        return selected;
      }
      selected.push((*photo).clone());
    }
  }
  selected
}
