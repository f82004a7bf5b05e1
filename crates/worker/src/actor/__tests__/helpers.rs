//! Test helpers for worker integration tests.
//!
//! Provides `WorkerTestContext` which spawns a full worker against a fake
//! device index and a pre-seeded document cache, so scenarios exercise the
//! real loop, scheduler, loaders, and culler without any network.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vantage_core::{
  config::WorkerConfig,
  geo::{Bounds, Coordinate},
  photo::PhotoRecord,
  source::{SourceConfig, SourceId, SourceKind},
};

use crate::{
  actor::{
    handle::WorkerHandle,
    worker::{PhotoWorker, WorkerDeps},
  },
  ipc::WorkerEvent,
  loader::{
    device::{DeviceIndex, DeviceIndexError, DevicePhotoPage, DevicePhotoQuery, DevicePhotoRecord},
    document::{DocumentCache, MemoryDocumentCache},
  },
};

// ============================================================================
// Fakes
// ============================================================================

/// Device index backed by an in-memory list.
pub struct FakeDeviceIndex {
  photos: Vec<DevicePhotoRecord>,
}

impl FakeDeviceIndex {
  pub fn new(photos: Vec<DevicePhotoRecord>) -> Self {
    Self { photos }
  }

  pub fn empty() -> Self {
    Self::new(Vec::new())
  }
}

#[async_trait]
impl DeviceIndex for FakeDeviceIndex {
  async fn query_photos(&self, query: DevicePhotoQuery) -> Result<DevicePhotoPage, DeviceIndexError> {
    let matching: Vec<DevicePhotoRecord> = self
      .photos
      .iter()
      .filter(|p| {
        p.latitude >= query.min_lat
          && p.latitude <= query.max_lat
          && p.longitude >= query.min_lng
          && p.longitude <= query.max_lng
      })
      .cloned()
      .collect();
    let total_count = matching.len();
    let start = query.page * query.page_size;
    let photos: Vec<DevicePhotoRecord> = matching.into_iter().skip(start).take(query.page_size).collect();
    let has_more = start + photos.len() < total_count;
    Ok(DevicePhotoPage {
      photos,
      total_count,
      has_more,
      error: None,
    })
  }
}

// ============================================================================
// Context
// ============================================================================

pub struct WorkerTestContext {
  pub handle: WorkerHandle,
  pub events: mpsc::Receiver<WorkerEvent>,
  pub cancel: CancellationToken,
}

impl WorkerTestContext {
  /// Spawn a worker with the given collaborators.
  pub fn spawn(device: FakeDeviceIndex, documents: Arc<MemoryDocumentCache>) -> Self {
    let cancel = CancellationToken::new();
    let deps = WorkerDeps {
      device: Arc::new(device),
      documents,
    };
    let (handle, events) = PhotoWorker::spawn(WorkerConfig::default(), deps, cancel.clone());
    Self {
      handle,
      events,
      cancel,
    }
  }

  /// Await the next photos update satisfying `pred`, skipping everything
  /// else (loading statuses, earlier intermediate updates).
  pub async fn photos_update_matching(
    &mut self,
    mut pred: impl FnMut(&[PhotoRecord], &[PhotoRecord]) -> bool,
  ) -> (Vec<PhotoRecord>, Vec<PhotoRecord>) {
    tokio::time::timeout(Duration::from_secs(5), async {
      loop {
        match self.events.recv().await {
          Some(WorkerEvent::PhotosUpdate {
            photos_in_area,
            photos_in_range,
            ..
          }) => {
            if pred(&photos_in_area, &photos_in_range) {
              return (photos_in_area, photos_in_range);
            }
          }
          Some(_) => continue,
          None => panic!("worker event channel closed"),
        }
      }
    })
    .await
    .expect("timed out waiting for a matching photos update")
  }
}

impl Drop for WorkerTestContext {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

// ============================================================================
// Builders
// ============================================================================

/// A roughly 20 x 20 km viewport.
pub fn munich_bounds() -> Bounds {
  Bounds::new(Coordinate::new(48.2, 11.0), Coordinate::new(48.0, 11.3))
}

pub fn device_source(id: &str) -> SourceConfig {
  SourceConfig {
    id: SourceId::new(id),
    kind: SourceKind::LocalDevice,
    enabled: true,
    endpoint: None,
    max_photos: None,
  }
}

pub fn document_source(id: &str, enabled: bool) -> SourceConfig {
  SourceConfig {
    id: SourceId::new(id),
    kind: SourceKind::StaticDocument,
    enabled,
    // never fetched in tests - the document cache is pre-seeded
    endpoint: Some(format!("https://example.test/{id}.json")),
    max_photos: None,
  }
}

pub fn doc_photo(id: &str, source: &str, lat: f64, lng: f64, bearing: f64) -> PhotoRecord {
  PhotoRecord {
    id: id.to_string(),
    source_id: SourceId::new(source),
    coord: Coordinate::new(lat, lng),
    bearing,
    altitude: 0.0,
    captured_at: None,
    sizes: Default::default(),
    creator: None,
  }
}

pub fn device_photo(id: &str, lat: f64, lng: f64) -> DevicePhotoRecord {
  DevicePhotoRecord {
    id: id.to_string(),
    filename: format!("{id}.jpg"),
    path: format!("/photos/{id}.jpg"),
    latitude: lat,
    longitude: lng,
    altitude: None,
    bearing: Some(45.0),
    timestamp: 1_700_000_000,
    accuracy: 5.0,
    width: 1000,
    height: 750,
    file_size: 1_000,
    created_at: 1_700_000_000,
  }
}

/// Seed a document cache for one source id.
pub fn seeded_documents(entries: &[(&str, Vec<PhotoRecord>)]) -> Arc<MemoryDocumentCache> {
  let cache = MemoryDocumentCache::default();
  for (source, photos) in entries {
    cache.insert(&SourceId::new(*source), Arc::new(photos.clone()));
  }
  Arc::new(cache)
}
