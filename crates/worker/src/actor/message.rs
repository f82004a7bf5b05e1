//! Internal events feeding the worker event loop.
//!
//! Loaders and process supervisors run as spawned tasks; everything they
//! produce funnels through one mpsc channel back into the single-threaded
//! loop, which is the only writer of worker state. Every event carries its
//! originating process id so late events from preempted sessions can be
//! dropped.

use vantage_core::{photo::PhotoRecord, source::SourceId};

use super::process::{ProcessId, ProcessKind};
use crate::loader::LoadError;

/// An event produced by a spawned task.
#[derive(Debug)]
pub enum InternalEvent {
  Loader(LoaderEvent),
  /// All loaders of a Config/Area process reached a terminal state.
  ProcessFinished {
    process_id: ProcessId,
    kind: ProcessKind,
    update_id: u64,
    aborted: bool,
  },
}

/// An event from one loader's session.
#[derive(Debug)]
pub struct LoaderEvent {
  pub process_id: ProcessId,
  pub source_id: SourceId,
  pub payload: LoaderEventPayload,
}

#[derive(Debug)]
pub enum LoaderEventPayload {
  /// The session began; the source's previous photos are superseded.
  Started,
  /// A cumulative batch of records.
  Batch(Vec<PhotoRecord>),
  /// Load progress in `[0, 1]`.
  Progress(f32),
  /// An unexpected connection transition worth telling the user about.
  Connection(ConnectionTransition),
  /// Terminal state of the session.
  Finished(Result<(), LoadError>),
}

/// Unexpected stream transitions; planned completion and planned
/// cancellation never produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
  Lost,
  Restored,
}
