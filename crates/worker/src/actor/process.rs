//! ProcessManager - tracks and priority-preempts in-flight workloads.
//!
//! A "process" here is a logical unit of scheduled work (config refresh,
//! area refresh, combine), not an OS process. Cancellation is cooperative:
//! preemption cancels the process's token, and the work observes it at its
//! next suspension point. The token is also what propagates the abort into
//! any held network connection.

use std::{collections::HashMap, time::Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub type ProcessId = u64;

/// The kind of a workload, which fixes its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
  Config,
  Area,
  Combine,
}

impl ProcessKind {
  /// Scheduling priority; higher preempts strictly lower.
  pub fn priority(self) -> u8 {
    match self {
      ProcessKind::Config => 3,
      ProcessKind::Area => 2,
      ProcessKind::Combine => 1,
    }
  }
}

/// One tracked workload.
#[derive(Debug)]
pub struct Process {
  pub id: ProcessId,
  pub kind: ProcessKind,
  /// Update id of the intent this process serves; combines carry none.
  pub update_id: Option<u64>,
  pub started_at: Instant,
  cancel: CancellationToken,
}

impl Process {
  pub fn abort_requested(&self) -> bool {
    self.cancel.is_cancelled()
  }
}

/// Creates, tracks, and preempts processes.
pub struct ProcessManager {
  next_id: ProcessId,
  entries: HashMap<ProcessId, Process>,
  parent: CancellationToken,
}

impl ProcessManager {
  pub fn new(parent: CancellationToken) -> Self {
    Self {
      next_id: 1,
      entries: HashMap::new(),
      parent,
    }
  }

  /// Register a new process, preempting strictly lower-priority work.
  ///
  /// Every existing non-aborted process whose priority tier is below the new
  /// one's gets its abort flag set before the new process is registered.
  /// Equal priority never preempts.
  pub fn start_process(&mut self, kind: ProcessKind, update_id: Option<u64>) -> (ProcessId, CancellationToken) {
    for process in self.entries.values() {
      if !process.abort_requested() && process.kind.priority() < kind.priority() {
        debug!(
          preempted = process.id,
          preempted_kind = ?process.kind,
          by = ?kind,
          "Preempting lower-priority process"
        );
        process.cancel.cancel();
      }
    }

    let id = self.next_id;
    self.next_id += 1;
    let cancel = self.parent.child_token();
    self.entries.insert(
      id,
      Process {
        id,
        kind,
        update_id,
        started_at: Instant::now(),
        cancel: cancel.clone(),
      },
    );
    trace!(process_id = id, kind = ?kind, update_id = ?update_id, "Process started");
    (id, cancel)
  }

  /// Whether the given process has been asked to stop. Unknown ids count as
  /// aborted so stale callers stand down.
  pub fn should_abort(&self, id: ProcessId) -> bool {
    self.entries.get(&id).is_none_or(Process::abort_requested)
  }

  /// Whether events from this process should still be applied.
  pub fn accepts(&self, id: ProcessId) -> bool {
    !self.should_abort(id)
  }

  /// Drop a completed process from the table.
  pub fn cleanup_process(&mut self, id: ProcessId) {
    if let Some(process) = self.entries.remove(&id) {
      trace!(
        process_id = id,
        kind = ?process.kind,
        update_id = ?process.update_id,
        elapsed_ms = process.started_at.elapsed().as_millis() as u64,
        "Process cleaned up"
      );
    }
  }

  /// True iff any non-aborted entry exists.
  pub fn has_active_processes(&self) -> bool {
    self.entries.values().any(|p| !p.abort_requested())
  }

  /// Highest priority among non-aborted entries.
  pub fn highest_active_priority(&self) -> Option<u8> {
    self
      .entries
      .values()
      .filter(|p| !p.abort_requested())
      .map(|p| p.kind.priority())
      .max()
  }

  /// Set every process's abort flag.
  pub fn abort_all_processes(&mut self) {
    for process in self.entries.values() {
      process.cancel.cancel();
    }
  }

  /// Forget all processes without touching their flags.
  pub fn clear_all_processes(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn manager() -> ProcessManager {
    ProcessManager::new(CancellationToken::new())
  }

  #[test]
  fn test_config_preempts_active_area() {
    let mut m = manager();
    let (area, _area_token) = m.start_process(ProcessKind::Area, Some(1));
    assert!(!m.should_abort(area));

    let (config, _) = m.start_process(ProcessKind::Config, Some(2));
    assert!(m.should_abort(area));
    assert!(!m.should_abort(config));
  }

  #[test]
  fn test_area_preempts_active_combine() {
    let mut m = manager();
    let (combine, _) = m.start_process(ProcessKind::Combine, None);
    let (area, _) = m.start_process(ProcessKind::Area, Some(1));
    assert!(m.should_abort(combine));
    assert!(!m.should_abort(area));
  }

  #[test]
  fn test_area_does_not_preempt_active_config() {
    let mut m = manager();
    let (config, _) = m.start_process(ProcessKind::Config, Some(1));
    let (area, _) = m.start_process(ProcessKind::Area, Some(1));
    assert!(!m.should_abort(config));
    assert!(!m.should_abort(area));
  }

  #[test]
  fn test_equal_priority_never_preempts() {
    let mut m = manager();
    let (first, _) = m.start_process(ProcessKind::Area, Some(1));
    let (second, _) = m.start_process(ProcessKind::Area, Some(2));
    assert!(!m.should_abort(first));
    assert!(!m.should_abort(second));
  }

  #[test]
  fn test_active_bookkeeping() {
    let mut m = manager();
    assert!(!m.has_active_processes());

    let (combine, _) = m.start_process(ProcessKind::Combine, None);
    assert!(m.has_active_processes());
    assert_eq!(m.highest_active_priority(), Some(1));

    let (config, _) = m.start_process(ProcessKind::Config, Some(1));
    // the combine is aborted now and no longer counts as active
    assert_eq!(m.highest_active_priority(), Some(3));

    m.cleanup_process(combine);
    m.cleanup_process(config);
    assert!(!m.has_active_processes());
  }

  #[test]
  fn test_abort_all_then_clear() {
    let mut m = manager();
    let (a, _) = m.start_process(ProcessKind::Area, Some(1));
    let (b, _) = m.start_process(ProcessKind::Config, Some(1));
    m.abort_all_processes();
    assert!(m.should_abort(a));
    assert!(m.should_abort(b));
    assert!(!m.has_active_processes());

    m.clear_all_processes();
    assert!(m.should_abort(a));
  }

  #[test]
  fn test_unknown_process_counts_as_aborted() {
    let m = manager();
    assert!(m.should_abort(99));
    assert!(!m.accepts(99));
  }

  #[test]
  fn test_cancelling_parent_aborts_children() {
    let parent = CancellationToken::new();
    let mut m = ProcessManager::new(parent.clone());
    let (id, _) = m.start_process(ProcessKind::Area, Some(1));
    parent.cancel();
    assert!(m.should_abort(id));
  }
}
