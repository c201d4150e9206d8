//! Core business logic modules
//!
//! Generation, layout and resolution are deterministic; the executor reaches
//! the file system and child processes only through the traits in
//! [`crate::traits`].

pub mod executor;
pub mod generator;
pub mod invocation;
pub mod layout;
pub mod ledger;
pub mod resolver;
pub mod series;
pub mod strategies;

pub use executor::{BatchExecutor, BatchOutcome, UnitFailure, UnitState};
pub use generator::{SeedPolicy, VariantGenerator};
pub use invocation::{AnalysisInvocation, ExitOutcome};
pub use layout::{AnalysisOutputs, ArtifactLayout};
pub use ledger::FailureLedger;
pub use resolver::{resolve, DiscoveredVariant, Resolution, ResolvedUnit, UnmatchedVariant};
pub use series::{SourceSeries, Variant};
pub use strategies::{MissingnessStrategy, StrategySet};
