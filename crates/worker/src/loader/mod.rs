//! Source loaders - one per configured photo source.
//!
//! A loader drives a single load session for its source: it fetches or
//! streams photo records, converts them into [`PhotoRecord`] shape, and
//! pushes batches into a [`LoaderSink`] until it reaches a terminal state.
//! Accumulated photos live in the worker's `SourcePhotosState` (single-writer
//! discipline), and cancellation arrives through the owning process's
//! `CancellationToken` - the loader must observe it at every suspension point
//! and let it close any held connection.
//!
//! # Variants
//!
//! - [`stream::StreamLoader`]: long-lived server-push feed
//! - [`device::DeviceLoader`]: one paginated query against the on-device index
//! - [`document::DocumentLoader`]: fetch-once JSON document with a per-source cache

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use vantage_core::{
  config::LoadingConfig,
  geo::Bounds,
  photo::PhotoRecord,
  source::{SourceConfig, SourceId, SourceKind},
};

use crate::{
  actor::{
    message::{ConnectionTransition, InternalEvent, LoaderEvent, LoaderEventPayload},
    process::ProcessId,
  },
  auth::{AuthError, AuthTokenManager},
};

pub mod device;
pub mod document;
pub mod stream;
mod wire;

// ============================================================================
// Error Types
// ============================================================================

/// Terminal outcome of a failed load session.
///
/// `Aborted` is the cooperative-cancellation case: it is resolved silently
/// and never surfaced to the user. Everything else reaches the host as a
/// toast plus a finished-with-error loading status.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
  #[error("load cancelled")]
  Aborted,
  #[error("auth failure: {0}")]
  Auth(#[from] AuthError),
  #[error("request failed: {0}")]
  Http(String),
  #[error("feed error: {0}")]
  Feed(String),
  #[error("decode failure: {0}")]
  Decode(String),
  #[error("device index failure: {0}")]
  Device(String),
}

impl LoadError {
  /// True for cooperative cancellation, which is never reported as a failure.
  pub fn is_abort(&self) -> bool {
    matches!(self, LoadError::Aborted)
  }
}

// ============================================================================
// Sink
// ============================================================================

/// Channel handle a loader pushes its events through.
///
/// Every event is tagged with the owning process id so the worker can drop
/// late events from preempted sessions.
#[derive(Clone)]
pub struct LoaderSink {
  process_id: ProcessId,
  source_id: SourceId,
  tx: mpsc::Sender<InternalEvent>,
}

impl LoaderSink {
  pub fn new(process_id: ProcessId, source_id: SourceId, tx: mpsc::Sender<InternalEvent>) -> Self {
    Self {
      process_id,
      source_id,
      tx,
    }
  }

  pub async fn started(&self) {
    self.send(LoaderEventPayload::Started).await;
  }

  pub async fn batch(&self, photos: Vec<PhotoRecord>) {
    self.send(LoaderEventPayload::Batch(photos)).await;
  }

  pub async fn progress(&self, fraction: f32) {
    self.send(LoaderEventPayload::Progress(fraction)).await;
  }

  pub async fn connection(&self, transition: ConnectionTransition) {
    self.send(LoaderEventPayload::Connection(transition)).await;
  }

  pub async fn finished(&self, result: Result<(), LoadError>) {
    self.send(LoaderEventPayload::Finished(result)).await;
  }

  async fn send(&self, payload: LoaderEventPayload) {
    let event = InternalEvent::Loader(LoaderEvent {
      process_id: self.process_id,
      source_id: self.source_id.clone(),
      payload,
    });
    if self.tx.send(event).await.is_err() {
      trace!(source_id = %self.source_id, "Worker gone, dropping loader event");
    }
  }
}

// ============================================================================
// SourceLoader contract
// ============================================================================

/// Polymorphic loader contract over the source variants.
#[async_trait]
pub trait SourceLoader: Send + Sync {
  fn source_id(&self) -> &SourceId;

  /// Drive one load session, pushing batches into `sink` until terminal.
  ///
  /// Suspends for as long as the session runs. Implementations observe
  /// `cancel` at every await point and return [`LoadError::Aborted`] once it
  /// fires, dropping any held connection on the way out.
  async fn load(&self, bounds: Option<&Bounds>, sink: &LoaderSink, cancel: &tokio_util::sync::CancellationToken)
  -> Result<(), LoadError>;
}

/// Everything a loader needs beyond its own `SourceConfig`.
#[derive(Clone)]
pub struct LoaderContext {
  pub http: reqwest::Client,
  /// Per-install id sent on every stream connection.
  pub client_id: String,
  pub auth: Arc<AuthTokenManager>,
  pub device: Arc<dyn device::DeviceIndex>,
  pub documents: Arc<dyn document::DocumentCache>,
  pub loading: LoadingConfig,
}

/// Build loaders for every enabled source of a validated config.
pub fn build_loaders(sources: &[SourceConfig], ctx: &LoaderContext) -> Vec<Arc<dyn SourceLoader>> {
  let mut loaders: Vec<Arc<dyn SourceLoader>> = Vec::new();
  for source in sources.iter().filter(|s| s.enabled) {
    match source.kind {
      SourceKind::Stream => {
        let Some(endpoint) = source.endpoint.clone() else {
          // validation rejects this before we get here
          warn!(source_id = %source.id, "Stream source without endpoint, skipping");
          continue;
        };
        loaders.push(Arc::new(stream::StreamLoader::new(source.clone(), endpoint, ctx)));
      }
      SourceKind::LocalDevice => {
        loaders.push(Arc::new(device::DeviceLoader::new(source.clone(), ctx)));
      }
      SourceKind::StaticDocument => {
        let Some(endpoint) = source.endpoint.clone() else {
          warn!(source_id = %source.id, "Document source without endpoint, skipping");
          continue;
        };
        loaders.push(Arc::new(document::DocumentLoader::new(source.clone(), endpoint, ctx)));
      }
    }
  }
  loaders
}
