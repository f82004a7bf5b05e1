//! AuthTokenManager - request/response correlator for credential tokens.
//!
//! A loader asks for a token without knowing how the host obtains one: the
//! manager emits a `get_auth_token` event and parks the caller on a shared
//! future. Concurrent callers join the same outstanding round trip instead
//! of issuing duplicates; resolution or rejection clears it so the next call
//! starts fresh. The 5-second ceiling on the round trip is the caller's job
//! (see the stream loader), not this component's.

use futures::{FutureExt, future::{BoxFuture, Shared}};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, trace};

use crate::ipc::WorkerEvent;

/// Failure of a token round trip. Cloneable because all joined waiters
/// receive the same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
  #[error("host rejected the token request: {0}")]
  Rejected(String),
  #[error("token request abandoned")]
  Abandoned,
  #[error("timed out waiting for a token")]
  TimedOut,
  #[error("worker event channel closed")]
  HostGone,
}

type TokenResult = Result<String, AuthError>;
type SharedToken = Shared<BoxFuture<'static, TokenResult>>;

struct PendingRequest {
  tx: oneshot::Sender<TokenResult>,
  shared: SharedToken,
}

pub struct AuthTokenManager {
  events: mpsc::Sender<WorkerEvent>,
  pending: Mutex<Option<PendingRequest>>,
}

impl AuthTokenManager {
  pub fn new(events: mpsc::Sender<WorkerEvent>) -> Self {
    Self {
      events,
      pending: Mutex::new(None),
    }
  }

  /// Obtain a token from the host.
  ///
  /// If a round trip is already outstanding, joins it; otherwise emits one
  /// `get_auth_token` event and waits for [`Self::resolve`]/[`Self::reject`].
  pub async fn get_valid_token(&self, force_refresh: bool) -> TokenResult {
    let (shared, fresh) = {
      let mut pending = self.pending.lock().await;
      match pending.as_ref() {
        Some(request) => {
          trace!("Joining outstanding token request");
          (request.shared.clone(), false)
        }
        None => {
          let (tx, rx) = oneshot::channel();
          let shared: SharedToken = async move {
            match rx.await {
              Ok(result) => result,
              Err(_) => Err(AuthError::Abandoned),
            }
          }
          .boxed()
          .shared();
          *pending = Some(PendingRequest {
            tx,
            shared: shared.clone(),
          });
          (shared, true)
        }
      }
    };

    if fresh {
      debug!(force_refresh, "Requesting auth token from host");
      if self.events.send(WorkerEvent::GetAuthToken { force_refresh }).await.is_err() {
        // nobody will ever answer; clear so a later call can try again
        self.pending.lock().await.take();
        return Err(AuthError::HostGone);
      }
    }

    shared.await
  }

  /// Complete the outstanding round trip with a token.
  pub async fn resolve(&self, token: String) {
    if let Some(request) = self.pending.lock().await.take() {
      let _ = request.tx.send(Ok(token));
    } else {
      trace!("Token response with no outstanding request, ignoring");
    }
  }

  /// Fail the outstanding round trip.
  pub async fn reject(&self, reason: String) {
    if let Some(request) = self.pending.lock().await.take() {
      let _ = request.tx.send(Err(AuthError::Rejected(reason)));
    }
  }
}
