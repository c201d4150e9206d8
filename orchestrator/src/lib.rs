//! Orchestrator library for missing-data robustness experiments
//!
//! Generates masked variants of heart-rate series under a chosen missingness
//! mechanism, then runs an external anomaly detector once per variant in a
//! bounded pool of child processes and reports which units failed.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{AnalysisCommandConfig, OrchestratorConfig};
pub use core::{BatchExecutor, BatchOutcome, FailureLedger, SeedPolicy, VariantGenerator};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, RunReport, SimulationReport};
pub use traits::{AnalysisRunner, ArtifactStore, MockAnalysisRunner, MockArtifactStore};
