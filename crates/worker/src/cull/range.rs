//! Stage 2 - angular range culling.
//!
//! From the area-culled set, select photos within range of the viewport
//! center whose bearings cover the full circle as evenly as possible. The
//! selection is bucket-based, not nearest-N: `cap` equal angular buckets,
//! each contributing its best candidate before any bucket contributes a
//! second one.
//!
//! Sorting by bearing is deliberately a separate final step so that
//! re-sorting after a removal never requires re-running selection.

use vantage_core::{
  geo::{Coordinate, angular_distance, haversine_m, normalize_bearing},
  photo::PhotoRecord,
};

/// Select up to `cap` photos within `range_m` of `center`, bearing-balanced.
pub fn cull_range(photos: &[PhotoRecord], center: &Coordinate, range_m: f64, cap: usize) -> Vec<PhotoRecord> {
  if cap == 0 {
    return Vec::new();
  }

  let in_range: Vec<&PhotoRecord> = photos
    .iter()
    .filter(|p| haversine_m(center, &p.coord) <= range_m)
    .collect();
  if in_range.is_empty() {
    return Vec::new();
  }

  let bucket_width = 360.0 / cap as f64;
  let mut buckets: Vec<Vec<&PhotoRecord>> = vec![Vec::new(); cap];
  for photo in in_range {
    let bearing = normalize_bearing(photo.bearing);
    let bucket = ((bearing / bucket_width) as usize).min(cap - 1);
    buckets[bucket].push(photo);
  }

  // best candidate first: closest bearing to the bucket center
  for (i, bucket) in buckets.iter_mut().enumerate() {
    let bucket_center = (i as f64 + 0.5) * bucket_width;
    bucket.sort_by(|a, b| {
      angular_distance(a.bearing, bucket_center).total_cmp(&angular_distance(b.bearing, bucket_center))
    });
  }

  // round-robin over buckets so every occupied direction is represented
  // before any direction contributes twice
  let mut selected = Vec::new();
  let mut round = 0;
  loop {
    let mut took_any = false;
    for bucket in &buckets {
      if let Some(photo) = bucket.get(round) {
        selected.push((*photo).clone());
        took_any = true;
        if selected.len() >= cap {
          return selected;
        }
      }
    }
    if !took_any {
      return selected;
    }
    round += 1;
  }
}

/// Final presentation order: ascending by bearing.
pub fn sort_by_bearing(photos: &mut [PhotoRecord]) {
  photos.sort_by(|a, b| a.bearing.total_cmp(&b.bearing));
}
