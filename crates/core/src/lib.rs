//! Shared domain types for the vantage photo worker.
//!
//! This crate holds the pure data model: geographic primitives, photo
//! records, source configuration, and worker settings. It performs no I/O
//! and has no async surface - everything here is plain serde-serializable
//! data plus the math that belongs with it.

pub mod config;
pub mod geo;
pub mod photo;
pub mod source;
