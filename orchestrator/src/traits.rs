//! Trait definitions with mockall annotations for testing
//!
//! The orchestrator reaches the file system and child processes only through
//! these traits, so every component can be driven by mocks in tests.

use std::path::{Path, PathBuf};

use crate::core::invocation::{AnalysisInvocation, ExitOutcome};
use crate::core::layout::AnalysisOutputs;
use crate::error::OrchestratorResult;
use shared::{AnalysisMode, ArtifactKind, UnitKey};

/// Keyed persistence of variants and analysis outputs
#[mockall::automock]
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` at the path derived from `key` and `kind`, replacing any
    /// previous content
    ///
    /// # Returns
    /// The path written. Only variant artifacts are written this way; analysis
    /// outputs are produced by the external collaborator.
    async fn put(&self, key: &UnitKey, kind: ArtifactKind, bytes: &[u8]) -> OrchestratorResult<PathBuf>;

    async fn exists(&self, path: &Path) -> bool;

    /// Remove a file; removing an absent file succeeds
    async fn remove(&self, path: &Path) -> OrchestratorResult<()>;

    fn path_for(&self, key: &UnitKey, mode: AnalysisMode, kind: ArtifactKind) -> PathBuf;

    /// Create output directories for one invocation and delete stale outputs
    async fn prepare_analysis_outputs(&self, key: &UnitKey, mode: AnalysisMode) -> OrchestratorResult<AnalysisOutputs>;
}

/// Launches the external anomaly detector
#[mockall::automock]
#[async_trait::async_trait]
pub trait AnalysisRunner: Send + Sync {
    /// Run one invocation to completion
    ///
    /// # Returns
    /// The child's exit outcome, or an error if it could not be spawned
    async fn run(&self, invocation: &AnalysisInvocation) -> OrchestratorResult<ExitOutcome>;
}
