//! Service implementations
//!
//! This module contains real implementations of all service traits.
//! These are the production implementations that handle actual I/O operations.

pub mod analysis_runner;
pub mod artifact_store;
pub mod process_output_handler;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use analysis_runner::RealAnalysisRunner;
pub use artifact_store::RealArtifactStore;
