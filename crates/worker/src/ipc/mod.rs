//! Host <-> worker message types.
//!
//! The worker consumes `HostRequest` values from its inbound channel and
//! emits `WorkerEvent` values on its outbound channel. Both sides are plain
//! serde types so the host can move them across whatever boundary it likes
//! (in-process channel, webview bridge, socket).

use serde::{Deserialize, Serialize};
use vantage_core::{
  geo::Bounds,
  photo::PhotoRecord,
  source::{SourceConfig, SourceId},
};

// ============================================================================
// Inbound (host -> worker)
// ============================================================================

/// A message from the host.
///
/// `message_id` values are assigned by the host and must be monotonically
/// increasing per kind; the worker uses them to decide whether a newer update
/// has superseded an older one.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "params")]
pub enum HostRequest {
  /// The full source configuration changed. Supersedes the previous config
  /// wholesale.
  ConfigUpdated {
    sources: Vec<SourceConfig>,
    message_id: u64,
  },
  /// The map viewport (and optionally the range radius) changed.
  AreaUpdated {
    bounds: Bounds,
    range: Option<f64>,
    message_id: u64,
  },
  /// Remove a single photo from the merged collection.
  RemovePhoto { photo_id: String, source: SourceId },
  /// Remove every photo by the given creator from one source.
  RemoveUserPhotos { user_id: String, source: SourceId },
  /// Response to an earlier `get_auth_token` event. `token` resolves the
  /// outstanding request; `error` (or neither field) rejects it.
  AuthToken {
    token: Option<String>,
    error: Option<String>,
  },
  /// Abort all in-flight work and exit the event loop. The only clean
  /// shutdown path.
  #[serde(alias = "terminate")]
  Cleanup,
}

// ============================================================================
// Outbound (worker -> host)
// ============================================================================

/// Severity of a host-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
  Info,
  Warning,
  Error,
}

/// An event for the host.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "payload")]
pub enum WorkerEvent {
  /// The culled photo sets changed.
  PhotosUpdate {
    photos_in_area: Vec<PhotoRecord>,
    photos_in_range: Vec<PhotoRecord>,
    current_range: f64,
  },
  /// Ask the host for a credential token. Answered with
  /// [`HostRequest::AuthToken`].
  GetAuthToken { force_refresh: bool },
  /// A user-visible notification.
  Toast {
    level: ToastLevel,
    message: String,
    source: Option<SourceId>,
  },
  /// Loading progress for one source.
  SourceLoadingStatus {
    source_id: SourceId,
    is_loading: bool,
    progress: Option<f32>,
    error: Option<String>,
  },
}
