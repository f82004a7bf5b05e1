//! FrontendState - the host's latest intents, versioned by message id.
//!
//! Pending work is decided by comparing update ids, never by booleans: a
//! newer update always supersedes an older one even if messages race, and an
//! aborted process simply never marks its id processed, leaving the work
//! pending for the next scheduling pass.

use vantage_core::{geo::Bounds, source::SourceConfig};

use super::process::ProcessKind;

/// The latest config message.
#[derive(Debug, Clone)]
struct ConfigIntent {
  sources: Vec<SourceConfig>,
  update_id: u64,
}

/// The latest viewport message.
#[derive(Debug, Clone)]
struct AreaIntent {
  bounds: Bounds,
  range_m: Option<f64>,
  update_id: u64,
}

/// A schedulable unit of pending work, highest priority first in
/// [`FrontendState::pending_work`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWork {
  Config { update_id: u64 },
  Area { update_id: u64 },
}

impl PendingWork {
  pub fn kind(self) -> ProcessKind {
    match self {
      PendingWork::Config { .. } => ProcessKind::Config,
      PendingWork::Area { .. } => ProcessKind::Area,
    }
  }
}

#[derive(Debug, Default)]
pub struct FrontendState {
  config: Option<ConfigIntent>,
  area: Option<AreaIntent>,
  last_processed_config: Option<u64>,
  last_processed_area: Option<u64>,
}

impl FrontendState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a config intent.
  pub fn record_config(&mut self, sources: Vec<SourceConfig>, update_id: u64) {
    self.config = Some(ConfigIntent { sources, update_id });
  }

  /// Record a viewport intent.
  pub fn record_area(&mut self, bounds: Bounds, range_m: Option<f64>, update_id: u64) {
    self.area = Some(AreaIntent {
      bounds,
      range_m,
      update_id,
    });
  }

  pub fn is_config_pending(&self) -> bool {
    self
      .config
      .as_ref()
      .is_some_and(|c| self.last_processed_config != Some(c.update_id))
  }

  pub fn is_area_pending(&self) -> bool {
    self
      .area
      .as_ref()
      .is_some_and(|a| self.last_processed_area != Some(a.update_id))
  }

  /// Pending work in decision order: config strictly before area.
  pub fn pending_work(&self) -> Vec<PendingWork> {
    let mut work = Vec::new();
    if let Some(config) = &self.config
      && self.last_processed_config != Some(config.update_id)
    {
      work.push(PendingWork::Config {
        update_id: config.update_id,
      });
    }
    if let Some(area) = &self.area
      && self.last_processed_area != Some(area.update_id)
    {
      work.push(PendingWork::Area {
        update_id: area.update_id,
      });
    }
    work
  }

  /// Mark a config update fully processed.
  pub fn mark_config_processed(&mut self, update_id: u64) {
    self.last_processed_config = Some(update_id);
  }

  /// Mark an area update fully processed.
  pub fn mark_area_processed(&mut self, update_id: u64) {
    self.last_processed_area = Some(update_id);
  }

  pub fn sources(&self) -> &[SourceConfig] {
    self.config.as_ref().map(|c| c.sources.as_slice()).unwrap_or_default()
  }

  pub fn bounds(&self) -> Option<&Bounds> {
    self.area.as_ref().map(|a| &a.bounds)
  }

  pub fn area_update_id(&self) -> Option<u64> {
    self.area.as_ref().map(|a| a.update_id)
  }

  pub fn range_m(&self) -> Option<f64> {
    self.area.as_ref().and_then(|a| a.range_m)
  }
}

#[cfg(test)]
mod tests {
  use vantage_core::geo::Coordinate;

  use super::*;

  fn bounds() -> Bounds {
    Bounds::new(Coordinate::new(1.0, 0.0), Coordinate::new(0.0, 1.0))
  }

  #[test]
  fn test_pending_is_id_comparison_not_boolean() {
    let mut state = FrontendState::new();
    assert!(!state.is_config_pending());

    state.record_config(Vec::new(), 1);
    assert!(state.is_config_pending());

    state.mark_config_processed(1);
    assert!(!state.is_config_pending());

    // a newer id supersedes, even after the older one was processed
    state.record_config(Vec::new(), 2);
    assert!(state.is_config_pending());

    // racing old completion cannot mask the newer intent
    state.mark_config_processed(1);
    assert!(state.is_config_pending());
  }

  #[test]
  fn test_pending_work_lists_config_before_area() {
    let mut state = FrontendState::new();
    state.record_area(bounds(), Some(200.0), 5);
    state.record_config(Vec::new(), 3);

    let work = state.pending_work();
    assert_eq!(
      work,
      vec![PendingWork::Config { update_id: 3 }, PendingWork::Area { update_id: 5 }]
    );
  }

  #[test]
  fn test_area_intent_accessors() {
    let mut state = FrontendState::new();
    assert!(state.bounds().is_none());
    state.record_area(bounds(), None, 7);
    assert_eq!(state.area_update_id(), Some(7));
    assert_eq!(state.range_m(), None);
  }
}
