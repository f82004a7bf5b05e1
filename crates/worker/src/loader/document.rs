//! Static document loader.
//!
//! Fetches one JSON document containing a complete array of photo records,
//! tags each record with its source, and stores the decoded array in an
//! injected per-source cache. A second load for the same source id is served
//! from the cache and never touches the network - cache lifetime and
//! invalidation stay visible at the injection site instead of hiding in
//! loader-owned globals.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vantage_core::{
  geo::Bounds,
  photo::PhotoRecord,
  source::{SourceConfig, SourceId},
};

use super::{LoadError, LoaderContext, LoaderSink, SourceLoader, wire::WirePhoto};

// ============================================================================
// Cache capability
// ============================================================================

/// Get/set-by-source-id cache for decoded documents.
pub trait DocumentCache: Send + Sync {
  fn get(&self, source: &SourceId) -> Option<Arc<Vec<PhotoRecord>>>;
  fn insert(&self, source: &SourceId, photos: Arc<Vec<PhotoRecord>>);
}

/// In-memory [`DocumentCache`] backed by a bounded moka cache.
pub struct MemoryDocumentCache {
  inner: moka::sync::Cache<SourceId, Arc<Vec<PhotoRecord>>>,
}

impl MemoryDocumentCache {
  pub fn new(max_sources: u64) -> Self {
    Self {
      inner: moka::sync::Cache::new(max_sources),
    }
  }
}

impl Default for MemoryDocumentCache {
  fn default() -> Self {
    Self::new(16)
  }
}

impl DocumentCache for MemoryDocumentCache {
  fn get(&self, source: &SourceId) -> Option<Arc<Vec<PhotoRecord>>> {
    self.inner.get(source)
  }

  fn insert(&self, source: &SourceId, photos: Arc<Vec<PhotoRecord>>) {
    self.inner.insert(source.clone(), photos);
  }
}

// ============================================================================
// Loader
// ============================================================================

pub struct DocumentLoader {
  source: SourceConfig,
  endpoint: String,
  http: reqwest::Client,
  cache: Arc<dyn DocumentCache>,
}

impl DocumentLoader {
  pub fn new(source: SourceConfig, endpoint: String, ctx: &LoaderContext) -> Self {
    Self {
      source,
      endpoint,
      http: ctx.http.clone(),
      cache: ctx.documents.clone(),
    }
  }
}

#[async_trait]
impl SourceLoader for DocumentLoader {
  fn source_id(&self) -> &SourceId {
    &self.source.id
  }

  async fn load(
    &self,
    _bounds: Option<&Bounds>,
    sink: &LoaderSink,
    cancel: &CancellationToken,
  ) -> Result<(), LoadError> {
    if let Some(photos) = self.cache.get(&self.source.id) {
      debug!(source_id = %self.source.id, count = photos.len(), "Serving document from cache");
      sink.batch((*photos).clone()).await;
      return Ok(());
    }

    let response = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(LoadError::Aborted),
      result = self.http.get(&self.endpoint).send() => {
        result.map_err(|e| LoadError::Http(e.to_string()))?
      }
    };
    let response = response.error_for_status().map_err(|e| LoadError::Http(e.to_string()))?;

    let documents: Vec<WirePhoto> = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(LoadError::Aborted),
      result = response.json() => result.map_err(|e| LoadError::Decode(e.to_string()))?,
    };

    let records: Vec<PhotoRecord> = documents.into_iter().map(|p| p.into_record(&self.source.id)).collect();
    debug!(source_id = %self.source.id, count = records.len(), "Document decoded");

    let shared = Arc::new(records);
    self.cache.insert(&self.source.id, shared.clone());
    sink.batch((*shared).clone()).await;
    Ok(())
  }
}
