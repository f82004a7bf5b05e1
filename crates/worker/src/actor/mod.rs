//! Actor-based worker core.
//!
//! The worker runs as one long-lived task owning all mutable state; loaders
//! and process supervisors are spawned tasks that feed results back over
//! channels. No shared-state concurrency, no locks.
//!
//! # Components
//!
//! - [`worker::PhotoWorker`]: the event loop (drain messages, decide work,
//!   start or block)
//! - [`process::ProcessManager`]: tracks in-flight workloads and applies the
//!   priority preemption rule
//! - [`frontend::FrontendState`]: latest host intents, versioned by message id
//! - [`photos::SourcePhotosState`]: merged per-source photo store

pub mod frontend;
pub mod handle;
pub mod message;
pub mod photos;
pub mod process;
pub mod worker;

#[cfg(test)]
mod __tests__;
