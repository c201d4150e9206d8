//! Shared types for the missing-data robustness pipeline
//!
//! Contains the identifiers that address the experiment matrix
//! (mechanism, rate, iteration, subject) and the process-aware logging
//! layer used by every binary in the workspace.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
