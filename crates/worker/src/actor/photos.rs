//! SourcePhotosState - the merged per-source photo store.
//!
//! Only the worker event loop writes here (loader batches arrive as
//! messages, removals arrive as host requests), so there is no locking.
//! The store never holds an entry for a source the latest config does not
//! enable.

use std::collections::HashMap;

use tracing::debug;
use vantage_core::{geo::Bounds, photo::PhotoRecord, source::SourceId};

#[derive(Debug, Default)]
pub struct SourcePhotosState {
  photos: HashMap<SourceId, Vec<PhotoRecord>>,
}

impl SourcePhotosState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Begin a new load session for a source, superseding its previous list.
  pub fn begin_load(&mut self, source: &SourceId) {
    self.photos.insert(source.clone(), Vec::new());
  }

  /// Append a batch from an in-progress session.
  pub fn extend(&mut self, source: &SourceId, batch: Vec<PhotoRecord>) {
    self.photos.entry(source.clone()).or_default().extend(batch);
  }

  /// All photos of one source.
  pub fn photos_for(&self, source: &SourceId) -> &[PhotoRecord] {
    self.photos.get(source).map(Vec::as_slice).unwrap_or_default()
  }

  /// Photos of one source inside the given bounds.
  pub fn photos_within(&self, source: &SourceId, bounds: &Bounds) -> Vec<&PhotoRecord> {
    self
      .photos_for(source)
      .iter()
      .filter(|p| bounds.contains(&p.coord))
      .collect()
  }

  /// Remove a single photo.
  pub fn remove_photo(&mut self, source: &SourceId, photo_id: &str) -> bool {
    let Some(photos) = self.photos.get_mut(source) else {
      return false;
    };
    let before = photos.len();
    photos.retain(|p| p.id != photo_id);
    before != photos.len()
  }

  /// Remove every photo by the given creator from one source.
  pub fn remove_user_photos(&mut self, source: &SourceId, user_id: &str) -> usize {
    let Some(photos) = self.photos.get_mut(source) else {
      return 0;
    };
    let before = photos.len();
    photos.retain(|p| p.creator.as_ref().is_none_or(|c| c.id != user_id));
    before - photos.len()
  }

  /// Drop every source not named by `keep`, returning how many were pruned.
  pub fn retain_sources<'a>(&mut self, keep: impl IntoIterator<Item = &'a SourceId>) -> usize {
    let keep: std::collections::HashSet<&SourceId> = keep.into_iter().collect();
    let before = self.photos.len();
    self.photos.retain(|id, _| keep.contains(id));
    let pruned = before - self.photos.len();
    if pruned > 0 {
      debug!(pruned, "Pruned disabled sources");
    }
    pruned
  }

}
