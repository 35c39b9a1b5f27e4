//! Quarry Core: shared errors, failure reports, and field-path utilities.
//!
//! This crate provides the foundational types used across all Quarry crates.
//! It has no internal Quarry dependencies.
//!
//! # Modules
//!
//! - [`capability`]: Per-field capability flags
//! - [`error`]: Error types, the coarse [`ErrorKind`] taxonomy, and the Result alias
//! - [`failure`]: Structured, aggregated validation failure reports
//! - [`path`]: Dot-separated field path utilities
//! - [`state`]: Watchable per-index lifecycle state

pub mod capability;
pub mod error;
pub mod failure;
pub mod path;
pub mod state;

// Re-export key types at crate root for convenience
pub use capability::{Capabilities, Capability};
pub use error::{Error, ErrorKind, Result};
pub use failure::{ContextFrame, FailureCollector, FailureKind, FailureRecord, FailureReport};
pub use state::{IndexState, IndexStateHandle};
