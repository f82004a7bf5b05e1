//! Streaming feed loader.
//!
//! Opens a long-lived server-push connection parameterized by the viewport,
//! the per-install client id, an optional result cap, and an auth token from
//! the [`AuthTokenManager`]. Events arrive as `data: {json}` frames separated
//! by blank lines; photo batches accumulate, `stream_complete` ends the
//! session, `error` is terminal.
//!
//! A failure within [`LoadingConfig::auth_retry_window_ms`] of the connection
//! attempt, before any successful open, is treated as a possible stale
//! credential and retried exactly once with a force-refreshed token. The
//! timing cutoff is an approximation - a slow network can miss a real
//! credential failure and a fast unrelated failure can trigger a spurious
//! refresh - so it is deliberately not made any smarter here.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use vantage_core::{geo::Bounds, source::{SourceConfig, SourceId}};

use super::{LoadError, LoaderContext, LoaderSink, SourceLoader, wire::WirePhoto};
use crate::{
  actor::message::ConnectionTransition,
  auth::{AuthError, AuthTokenManager},
};

// ============================================================================
// Wire events
// ============================================================================

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
  Photos {
    photos: Vec<WirePhoto>,
    #[serde(default, rename = "hasNext")]
    has_next: Option<bool>,
  },
  StreamComplete {
    #[serde(default)]
    total_all_photos: Option<usize>,
  },
  Error {
    message: String,
  },
}

/// Incremental splitter for `data: {...}` frames delimited by blank lines.
#[derive(Default)]
struct SseFrameBuffer {
  buf: String,
}

impl SseFrameBuffer {
  /// Feed a chunk, returning the payloads of every completed frame.
  fn push(&mut self, chunk: &[u8]) -> Vec<String> {
    self.buf.push_str(&String::from_utf8_lossy(chunk));
    let mut payloads = Vec::new();
    while let Some(pos) = self.buf.find("\n\n") {
      let frame: String = self.buf.drain(..pos + 2).collect();
      for line in frame.lines() {
        if let Some(data) = line.strip_prefix("data:") {
          let data = data.trim();
          if !data.is_empty() {
            payloads.push(data.to_string());
          }
        }
      }
    }
    payloads
  }
}

/// One session's connection bookkeeping.
#[derive(Default)]
struct SessionState {
  /// A response was successfully opened at least once.
  opened_once: bool,
  /// Connection attempts that failed.
  failures: u32,
}

/// Whether a failed attempt should be retried with a forced token refresh.
///
/// Only an immediate first failure qualifies: anything after a successful
/// open, outside the window, or past the single-retry budget is terminal.
fn stale_credential_suspected(elapsed: Duration, window: Duration, state: &SessionState, retried: bool) -> bool {
  !retried && !state.opened_once && elapsed < window
}

// ============================================================================
// Loader
// ============================================================================

pub struct StreamLoader {
  source: SourceConfig,
  endpoint: String,
  http: reqwest::Client,
  client_id: String,
  auth: Arc<AuthTokenManager>,
  auth_timeout: Duration,
  retry_window: Duration,
}

impl StreamLoader {
  pub fn new(source: SourceConfig, endpoint: String, ctx: &LoaderContext) -> Self {
    Self {
      source,
      endpoint,
      http: ctx.http.clone(),
      client_id: ctx.client_id.clone(),
      auth: ctx.auth.clone(),
      auth_timeout: Duration::from_secs(ctx.loading.auth_timeout_secs),
      retry_window: Duration::from_millis(ctx.loading.auth_retry_window_ms),
    }
  }

  /// One auth round trip, with the ceiling enforced here rather than in the
  /// token manager.
  async fn request_token(&self, force_refresh: bool) -> Result<String, LoadError> {
    match tokio::time::timeout(self.auth_timeout, self.auth.get_valid_token(force_refresh)).await {
      Ok(Ok(token)) => Ok(token),
      Ok(Err(e)) => Err(LoadError::Auth(e)),
      Err(_) => Err(LoadError::Auth(AuthError::TimedOut)),
    }
  }

  fn query_params(&self, bounds: &Bounds, token: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("top_left_lat", bounds.top_left.lat.to_string()),
      ("top_left_lon", bounds.top_left.lng.to_string()),
      ("bottom_right_lat", bounds.bottom_right.lat.to_string()),
      ("bottom_right_lon", bounds.bottom_right.lng.to_string()),
      ("client_id", self.client_id.clone()),
    ];
    if let Some(max) = self.source.max_photos {
      params.push(("max_photos", max.to_string()));
    }
    if !token.is_empty() {
      params.push(("token", token.to_string()));
    }
    params
  }

  /// Open the connection and consume it to completion.
  async fn run_stream(
    &self,
    bounds: &Bounds,
    token: &str,
    sink: &LoaderSink,
    cancel: &CancellationToken,
    state: &mut SessionState,
  ) -> Result<(), LoadError> {
    let request = self.http.get(&self.endpoint).query(&self.query_params(bounds, token));

    let response = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(LoadError::Aborted),
      result = request.send() => result.map_err(|e| LoadError::Http(e.to_string()))?,
    };
    let response = response.error_for_status().map_err(|e| LoadError::Http(e.to_string()))?;

    if state.failures > 0 {
      sink.connection(ConnectionTransition::Restored).await;
    }
    state.opened_once = true;
    debug!(source_id = %self.source.id, "Stream opened");

    let mut body = response.bytes_stream();
    let mut frames = SseFrameBuffer::default();
    let mut total_received = 0usize;

    loop {
      let chunk = tokio::select! {
        biased;
        // dropping `body` here closes the underlying connection
        _ = cancel.cancelled() => return Err(LoadError::Aborted),
        chunk = body.next() => chunk,
      };

      let bytes = match chunk {
        Some(Ok(bytes)) => bytes,
        Some(Err(e)) => return Err(LoadError::Http(e.to_string())),
        None => return Err(LoadError::Feed("stream ended without completion".to_string())),
      };

      for payload in frames.push(&bytes) {
        match serde_json::from_str::<StreamEvent>(&payload) {
          Ok(StreamEvent::Photos { photos, has_next }) => {
            total_received += photos.len();
            trace!(
              source_id = %self.source.id,
              batch = photos.len(),
              total = total_received,
              has_next = ?has_next,
              "Photo batch"
            );
            let records = photos.into_iter().map(|p| p.into_record(&self.source.id)).collect();
            sink.batch(records).await;
          }
          Ok(StreamEvent::StreamComplete { total_all_photos }) => {
            debug!(
              source_id = %self.source.id,
              received = total_received,
              reported = ?total_all_photos,
              "Stream complete"
            );
            return Ok(());
          }
          Ok(StreamEvent::Error { message }) => return Err(LoadError::Feed(message)),
          Err(e) => return Err(LoadError::Decode(e.to_string())),
        }
      }
    }
  }
}

#[async_trait::async_trait]
impl SourceLoader for StreamLoader {
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
      debug!(source_id = %self.source.id, "No viewport yet, nothing to stream");
      return Ok(());
    };

    let mut state = SessionState::default();
    let mut retried = false;
    let mut force_refresh = false;

    loop {
      let token = self.request_token(force_refresh).await?;
      let attempt = Instant::now();

      match self.run_stream(bounds, &token, sink, cancel, &mut state).await {
        Ok(()) => return Ok(()),
        Err(LoadError::Aborted) => return Err(LoadError::Aborted),
        Err(err) => {
          state.failures += 1;
          if stale_credential_suspected(attempt.elapsed(), self.retry_window, &state, retried) {
            warn!(source_id = %self.source.id, error = %err, "Immediate stream failure, retrying with fresh token");
            retried = true;
            force_refresh = true;
            continue;
          }
          if state.opened_once {
            sink.connection(ConnectionTransition::Lost).await;
          }
          return Err(err);
        }
      }
    }
  }
}
