//! Handle for communicating with a running worker.

use tokio::sync::mpsc;

use crate::ipc::HostRequest;

/// Error when sending to the worker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Worker has shut down")]
  WorkerGone,
}

/// Cheap-to-clone sender side of the worker's inbound channel.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
  tx: mpsc::Sender<HostRequest>,
}

impl WorkerHandle {
  pub fn new(tx: mpsc::Sender<HostRequest>) -> Self {
    Self { tx }
  }

  /// Queue a host message for the worker.
  pub async fn send(&self, request: HostRequest) -> Result<(), SendError> {
    self.tx.send(request).await.map_err(|_| SendError::WorkerGone)
  }

  /// Request a clean shutdown.
  pub async fn cleanup(&self) -> Result<(), SendError> {
    self.send(HostRequest::Cleanup).await
  }
}
