//! PhotoWorker - the single control loop.
//!
//! One logical control thread owns all worker state. Loaders and process
//! supervisors run as spawned tasks, but everything they produce re-enters
//! the loop as a message, so state has exactly one writer and no locks.
//!
//! # Message Flow
//!
//! ```text
//! Host -> HostRequest -> PhotoWorker -> [ProcessManager, SourceLoaders]
//!                            |                  |
//!                            v                  v
//!                       WorkerEvent <- PhotoCuller / loader events
//! ```
//!
//! # Loop body
//!
//! 1. Drain queued host messages, routing each through the dispatch table.
//! 2. With no queued messages and no pending work, await the next message -
//!    the only true suspension point.
//! 3. With pending work and no active process (or only strictly
//!    lower-priority ones, which the new process preempts), start the
//!    highest-priority pending item.
//! 4. With pending work gated behind an active equal-or-higher-priority
//!    process, mark the loop blocked and await the next message rather
//!    than spin.
//!
//! A `cleanup`/`terminate` request aborts all processes and exits the loop;
//! it is the only clean shutdown path.

use std::{ops::ControlFlow, sync::Arc};

use tokio::sync::{mpsc, mpsc::error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use vantage_core::{
  config::WorkerConfig,
  source::{SourceConfig, SourceId, validate_sources},
};

use super::{
  frontend::{FrontendState, PendingWork},
  handle::WorkerHandle,
  message::{ConnectionTransition, InternalEvent, LoaderEvent, LoaderEventPayload},
  photos::SourcePhotosState,
  process::{ProcessKind, ProcessManager},
};
use crate::{
  auth::AuthTokenManager,
  cull::{PhotoCuller, SourcePhotos},
  ipc::{HostRequest, ToastLevel, WorkerEvent},
  loader::{self, LoaderContext, LoaderSink},
};

/// Host-provided collaborators the worker cannot build itself.
pub struct WorkerDeps {
  /// Port to the on-device photo index.
  pub device: Arc<dyn loader::device::DeviceIndex>,
  /// Per-source cache for decoded static documents.
  pub documents: Arc<dyn loader::document::DocumentCache>,
}

/// A schedulable item, highest priority first.
#[derive(Debug, Clone, Copy)]
enum WorkItem {
  Pending(PendingWork),
  Combine,
}

impl WorkItem {
  fn kind(self) -> ProcessKind {
    match self {
      WorkItem::Pending(pending) => pending.kind(),
      WorkItem::Combine => ProcessKind::Combine,
    }
  }
}

pub struct PhotoWorker {
  config: WorkerConfig,
  ctx: LoaderContext,
  frontend: FrontendState,
  photos: SourcePhotosState,
  processes: ProcessManager,
  culler: PhotoCuller,
  /// A combine pass is due (loads finished or photos were removed).
  combine_pending: bool,
  /// Pending work exists but is gated behind an active process.
  blocked: bool,
  host_rx: mpsc::Receiver<HostRequest>,
  internal_tx: mpsc::Sender<InternalEvent>,
  internal_rx: mpsc::Receiver<InternalEvent>,
  events: mpsc::Sender<WorkerEvent>,
  cancel: CancellationToken,
}

impl PhotoWorker {
  /// Spawn a worker and return the host's two ends: a handle for inbound
  /// messages and the outbound event stream.
  pub fn spawn(
    config: WorkerConfig,
    deps: WorkerDeps,
    cancel: CancellationToken,
  ) -> (WorkerHandle, mpsc::Receiver<WorkerEvent>) {
    let (host_tx, host_rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(256);
    let (internal_tx, internal_rx) = mpsc::channel(256);

    let auth = Arc::new(AuthTokenManager::new(event_tx.clone()));
    let ctx = LoaderContext {
      http: reqwest::Client::new(),
      client_id: Uuid::new_v4().to_string(),
      auth,
      device: deps.device,
      documents: deps.documents,
      loading: config.loading.clone(),
    };

    let worker = Self {
      culler: PhotoCuller::new(config.culling.clone()),
      processes: ProcessManager::new(cancel.child_token()),
      config,
      ctx,
      frontend: FrontendState::new(),
      photos: SourcePhotosState::new(),
      combine_pending: false,
      blocked: false,
      host_rx,
      internal_tx,
      internal_rx,
      events: event_tx,
      cancel,
    };
    tokio::spawn(worker.run());

    (WorkerHandle::new(host_tx), event_rx)
  }

  /// Main event loop.
  async fn run(mut self) {
    info!(client_id = %self.ctx.client_id, "PhotoWorker started");

    'outer: loop {
      // (1) drain queued host messages
      loop {
        match self.host_rx.try_recv() {
          Ok(msg) => {
            self.blocked = false;
            if self.route(msg).await.is_break() {
              break 'outer;
            }
          }
          Err(TryRecvError::Empty) => break,
          Err(TryRecvError::Disconnected) => {
            info!("Host channel closed, shutting down");
            break 'outer;
          }
        }
      }
      // apply queued loader/process events before deciding work
      while let Ok(event) = self.internal_rx.try_recv() {
        self.apply(event).await;
      }

      // (3) start pending work unless an equal-or-higher-priority process
      // is still active
      if let Some(work) = self.next_work() {
        let can_start = match self.processes.highest_active_priority() {
          None => true,
          Some(active) => work.kind().priority() > active,
        };
        if can_start {
          self.blocked = false;
          self.start_work(work).await;
          continue;
        }
        if !self.blocked {
          trace!(work = ?work, "Blocked on active process");
        }
        self.blocked = true;
      }

      // (2)/(4) the only suspension point
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("PhotoWorker shutting down (cancelled)");
          break;
        }

        msg = self.host_rx.recv() => match msg {
          Some(msg) => {
            self.blocked = false;
            if self.route(msg).await.is_break() {
              break;
            }
          }
          None => {
            info!("Host channel closed, shutting down");
            break;
          }
        },

        event = self.internal_rx.recv() => {
          if let Some(event) = event {
            self.apply(event).await;
          }
        }
      }
    }

    self.processes.abort_all_processes();
    self.processes.clear_all_processes();
    info!("PhotoWorker stopped");
  }

  // ==========================================================================
  // Routing (host messages)
  // ==========================================================================

  /// Dispatch table mapping inbound message kinds to handlers.
  async fn route(&mut self, msg: HostRequest) -> ControlFlow<()> {
    match msg {
      HostRequest::ConfigUpdated { sources, message_id } => {
        self.on_config_updated(sources, message_id).await;
      }
      HostRequest::AreaUpdated {
        bounds,
        range,
        message_id,
      } => {
        debug!(message_id, ?bounds, range, "Area updated");
        self.frontend.record_area(bounds, range, message_id);
      }
      HostRequest::RemovePhoto { photo_id, source } => {
        if self.photos.remove_photo(&source, &photo_id) {
          debug!(%source, photo_id, "Photo removed");
          self.combine_pending = true;
        }
      }
      HostRequest::RemoveUserPhotos { user_id, source } => {
        let removed = self.photos.remove_user_photos(&source, &user_id);
        if removed > 0 {
          debug!(%source, user_id, removed, "User photos removed");
          self.combine_pending = true;
        }
      }
      HostRequest::AuthToken { token, error } => match token {
        Some(token) => self.ctx.auth.resolve(token).await,
        None => {
          self
            .ctx
            .auth
            .reject(error.unwrap_or_else(|| "no token provided".to_string()))
            .await;
        }
      },
      HostRequest::Cleanup => {
        info!("Cleanup requested, aborting all processes");
        self.processes.abort_all_processes();
        return ControlFlow::Break(());
      }
    }
    ControlFlow::Continue(())
  }

  async fn on_config_updated(&mut self, sources: Vec<SourceConfig>, message_id: u64) {
    debug!(message_id, count = sources.len(), "Config updated");
    if let Err(e) = validate_sources(&sources) {
      warn!(error = %e, message_id, "Rejecting malformed source config");
      self
        .toast(ToastLevel::Error, format!("Invalid source configuration: {e}"), None)
        .await;
      // nothing will ever run for this id
      self.frontend.mark_config_processed(message_id);
      return;
    }

    // the store must never hold photos for a disabled or unknown source
    let enabled: Vec<SourceId> = sources.iter().filter(|s| s.enabled).map(|s| s.id.clone()).collect();
    if self.photos.retain_sources(enabled.iter()) > 0 {
      self.combine_pending = true;
    }
    self.frontend.record_config(sources, message_id);
  }

  // ==========================================================================
  // Scheduling
  // ==========================================================================

  fn next_work(&self) -> Option<WorkItem> {
    if let Some(pending) = self.frontend.pending_work().into_iter().next() {
      return Some(WorkItem::Pending(pending));
    }
    if self.combine_pending {
      return Some(WorkItem::Combine);
    }
    None
  }

  async fn start_work(&mut self, work: WorkItem) {
    match work {
      WorkItem::Pending(PendingWork::Config { update_id }) => {
        self.start_load_process(ProcessKind::Config, update_id);
      }
      WorkItem::Pending(PendingWork::Area { update_id }) => {
        self.start_load_process(ProcessKind::Area, update_id);
      }
      WorkItem::Combine => self.run_combine().await,
    }
  }

  /// Start a Config/Area process: one loader session per enabled source,
  /// supervised by a spawned task that reports completion as a message.
  fn start_load_process(&mut self, kind: ProcessKind, update_id: u64) {
    let sources = self.frontend.sources().to_vec();
    let bounds = self.frontend.bounds().copied();
    let (process_id, token) = self.processes.start_process(kind, Some(update_id));
    let loaders = loader::build_loaders(&sources, &self.ctx);
    debug!(
      process_id,
      kind = ?kind,
      update_id,
      loaders = loaders.len(),
      "Starting load process"
    );

    let internal_tx = self.internal_tx.clone();
    tokio::spawn(async move {
      let sessions: Vec<_> = loaders
        .into_iter()
        .map(|loader| {
          let sink = LoaderSink::new(process_id, loader.source_id().clone(), internal_tx.clone());
          let session_token = token.clone();
          async move {
            sink.started().await;
            let result = loader.load(bounds.as_ref(), &sink, &session_token).await;
            sink.finished(result).await;
          }
        })
        .collect();
      futures::future::join_all(sessions).await;

      let aborted = token.is_cancelled();
      let finished = InternalEvent::ProcessFinished {
        process_id,
        kind,
        update_id,
        aborted,
      };
      let _ = internal_tx.send(finished).await;
    });
  }

  /// Run a combine pass inline: merge, cull, emit.
  ///
  /// Registered with the ProcessManager like any other process so that a
  /// config or area start observes (and preempts) it, but executed on the
  /// loop itself - it is pure CPU work over owned state.
  async fn run_combine(&mut self) {
    self.combine_pending = false;
    let (Some(bounds), Some(update_id)) = (self.frontend.bounds().copied(), self.frontend.area_update_id()) else {
      trace!("Combine requested before any viewport, skipping");
      return;
    };

    let (process_id, token) = self.processes.start_process(ProcessKind::Combine, None);
    let range_m = self.frontend.range_m().unwrap_or(self.config.culling.default_range_m);

    let ordered = self.ordered_sources();
    // each source's contribution is clipped to the viewport before selection
    let merged: Vec<SourcePhotos<'_>> = ordered
      .iter()
      .map(|id| SourcePhotos {
        source_id: id,
        photos: self.photos.photos_within(id, &bounds),
      })
      .collect();
    let output = self.culler.cull(&merged, &bounds, update_id, range_m);
    drop(merged);

    if token.is_cancelled() {
      trace!(process_id, "Combine aborted before emit");
    } else {
      self
        .emit(WorkerEvent::PhotosUpdate {
          photos_in_area: output.photos_in_area,
          photos_in_range: output.photos_in_range,
          current_range: range_m,
        })
        .await;
    }
    self.processes.cleanup_process(process_id);
  }

  /// Enabled source ids in culling priority order: device first, then
  /// streams, then static documents; config order breaks ties.
  fn ordered_sources(&self) -> Vec<SourceId> {
    let mut enabled: Vec<(usize, &SourceConfig)> = self
      .frontend
      .sources()
      .iter()
      .enumerate()
      .filter(|(_, s)| s.enabled)
      .collect();
    enabled.sort_by_key(|(index, source)| (source.kind.rank(), *index));
    enabled.into_iter().map(|(_, source)| source.id.clone()).collect()
  }

  // ==========================================================================
  // Internal events (loader batches, process completion)
  // ==========================================================================

  async fn apply(&mut self, event: InternalEvent) {
    match event {
      InternalEvent::Loader(event) => self.apply_loader_event(event).await,
      InternalEvent::ProcessFinished {
        process_id,
        kind,
        update_id,
        aborted,
      } => {
        debug!(process_id, kind = ?kind, update_id, aborted, "Process finished");
        self.processes.cleanup_process(process_id);
        if !aborted {
          match kind {
            ProcessKind::Config => self.frontend.mark_config_processed(update_id),
            ProcessKind::Area => self.frontend.mark_area_processed(update_id),
            ProcessKind::Combine => {}
          }
          self.combine_pending = true;
        }
      }
    }
  }

  async fn apply_loader_event(&mut self, event: LoaderEvent) {
    let LoaderEvent {
      process_id,
      source_id,
      payload,
    } = event;

    match payload {
      LoaderEventPayload::Started => {
        if !self.processes.accepts(process_id) {
          trace!(%source_id, process_id, "Dropping stale session start");
          return;
        }
        self.photos.begin_load(&source_id);
        self
          .emit(WorkerEvent::SourceLoadingStatus {
            source_id,
            is_loading: true,
            progress: None,
            error: None,
          })
          .await;
      }
      LoaderEventPayload::Batch(batch) => {
        if !self.processes.accepts(process_id) {
          trace!(%source_id, process_id, batch = batch.len(), "Dropping stale batch");
          return;
        }
        trace!(%source_id, batch = batch.len(), "Photo batch");
        self.photos.extend(&source_id, batch);
      }
      LoaderEventPayload::Progress(fraction) => {
        if !self.processes.accepts(process_id) {
          return;
        }
        self
          .emit(WorkerEvent::SourceLoadingStatus {
            source_id,
            is_loading: true,
            progress: Some(fraction),
            error: None,
          })
          .await;
      }
      LoaderEventPayload::Connection(transition) => {
        let (level, message) = match transition {
          ConnectionTransition::Lost => (ToastLevel::Warning, format!("Connection to {source_id} lost")),
          ConnectionTransition::Restored => (ToastLevel::Info, format!("Connection to {source_id} restored")),
        };
        self.toast(level, message, Some(source_id)).await;
      }
      LoaderEventPayload::Finished(result) => {
        let error = match result {
          Ok(()) => None,
          Err(e) if e.is_abort() => {
            trace!(%source_id, "Load cancelled");
            None
          }
          Err(e) => {
            warn!(%source_id, error = %e, "Source load failed");
            self
              .toast(
                ToastLevel::Error,
                format!("Failed to load photos from {source_id}: {e}"),
                Some(source_id.clone()),
              )
              .await;
            Some(e.to_string())
          }
        };
        self
          .emit(WorkerEvent::SourceLoadingStatus {
            source_id,
            is_loading: false,
            progress: None,
            error,
          })
          .await;
      }
    }
  }

  // ==========================================================================
  // Outbound
  // ==========================================================================

  async fn emit(&self, event: WorkerEvent) {
    if self.events.send(event).await.is_err() {
      trace!("Host event channel closed, dropping event");
    }
  }

  async fn toast(&self, level: ToastLevel, message: String, source: Option<SourceId>) {
    self
      .emit(WorkerEvent::Toast {
        level,
        message,
        source,
      })
      .await;
  }
}
