//! Geographic primitives: coordinates, viewport bounds, bearing math.
//!
//! Bounds may wrap the antimeridian: a rectangle whose top-left longitude is
//! greater than its bottom-right longitude spans the 180° meridian, and every
//! containment/width/center computation here accounts for that.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub lat: f64,
  pub lng: f64,
}

impl Coordinate {
  pub fn new(lat: f64, lng: f64) -> Self {
    Self { lat, lng }
  }
}

/// Rectangular geographic viewport.
///
/// `top_left.lng > bottom_right.lng` signals a rectangle that wraps the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub top_left: Coordinate,
  pub bottom_right: Coordinate,
}

impl Bounds {
  pub fn new(top_left: Coordinate, bottom_right: Coordinate) -> Self {
    Self { top_left, bottom_right }
  }

  pub fn wraps_antimeridian(&self) -> bool {
    self.top_left.lng > self.bottom_right.lng
  }

  /// Longitudinal span in degrees, in (0, 360].
  pub fn lng_span(&self) -> f64 {
    let span = (self.bottom_right.lng - self.top_left.lng).rem_euclid(360.0);
    if span == 0.0 { 360.0 } else { span }
  }

  /// Latitudinal span in degrees.
  pub fn lat_span(&self) -> f64 {
    self.top_left.lat - self.bottom_right.lat
  }

  /// Whether `coord` lies inside the rectangle, wrap-aware.
  pub fn contains(&self, coord: &Coordinate) -> bool {
    if coord.lat > self.top_left.lat || coord.lat < self.bottom_right.lat {
      return false;
    }
    if self.wraps_antimeridian() {
      coord.lng >= self.top_left.lng || coord.lng <= self.bottom_right.lng
    } else {
      coord.lng >= self.top_left.lng && coord.lng <= self.bottom_right.lng
    }
  }

  /// Geometric center of the rectangle.
  ///
  /// The longitude midpoint is computed along the span so that a wrapping
  /// rectangle centers near the antimeridian instead of near 0°. Midpoints
  /// are normalized into `[-180, 180)`, so an exactly-180 midpoint comes
  /// back as -180.
  pub fn center(&self) -> Coordinate {
    let lat = (self.top_left.lat + self.bottom_right.lat) / 2.0;
    let mut lng = self.top_left.lng + self.lng_span() / 2.0;
    if lng >= 180.0 {
      lng -= 360.0;
    }
    Coordinate::new(lat, lng)
  }
}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_m(a: &Coordinate, b: &Coordinate) -> f64 {
  let lat_a = a.lat.to_radians();
  let lat_b = b.lat.to_radians();
  let d_lat = (b.lat - a.lat).to_radians();
  let d_lng = (b.lng - a.lng).to_radians();

  let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Normalize a compass bearing into `[0, 360)`.
pub fn normalize_bearing(deg: f64) -> f64 {
  let n = deg.rem_euclid(360.0);
  // rem_euclid(360) can yield exactly 360.0 for tiny negative inputs
  if n >= 360.0 { 0.0 } else { n }
}

/// Smallest angle between two bearings, in `[0, 180]`.
pub fn angular_distance(a: f64, b: f64) -> f64 {
  let d = (normalize_bearing(a) - normalize_bearing(b)).abs();
  d.min(360.0 - d)
}
