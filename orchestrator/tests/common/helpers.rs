//! Test helpers and builder patterns for orchestrator tests
//!
//! This module provides a temporary data workspace, a builder for test
//! orchestrators and a scripted analysis runner that writes outputs like
//! the real detector would.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use orchestrator::core::{AnalysisInvocation, ExitOutcome};
use orchestrator::services::RealArtifactStore;
use orchestrator::{
    AnalysisRunner, MockAnalysisRunner, Orchestrator, OrchestratorConfig, OrchestratorResult, SimulationReport,
};
use shared::{Mechanism, MissingRate};

use super::fixtures::TestFixtures;

/// Source, variant and result roots inside one temporary directory
pub struct TestWorkspace {
    pub dir: TempDir,
    pub config: OrchestratorConfig,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source_root = dir.path().join("source");
        std::fs::create_dir_all(&source_root).unwrap();
        let config = OrchestratorConfig::default()
            .with_source_root(source_root)
            .with_missing_root(dir.path().join("missing"))
            .with_results_root(dir.path().join("results"))
            .with_concurrency(TestFixtures::DEFAULT_CONCURRENCY);
        Self { dir, config }
    }

    pub fn write_source(&self, subject: &str, rows: usize) -> PathBuf {
        let path = self.config.source_root.join(format!("{subject}_hr.csv"));
        std::fs::write(&path, TestFixtures::heart_rate_csv(subject, rows)).unwrap();
        path
    }

    pub fn write_auxiliary(&self, subject: &str) -> PathBuf {
        let path = self.config.source_root.join(format!("{subject}_steps.csv"));
        std::fs::write(&path, TestFixtures::steps_csv(subject)).unwrap();
        path
    }

    /// Sources and auxiliary files for every given subject
    pub fn seed_subjects(&self, subjects: &[&str]) {
        for subject in subjects {
            self.write_source(subject, TestFixtures::DEFAULT_ROWS);
            self.write_auxiliary(subject);
        }
    }

    /// Regular files directly inside `dir`, sorted
    pub fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    pub fn results_dir(&self, mode: &str, subject: &str, kind_dir: &str, mechanism: Mechanism, rate: MissingRate) -> PathBuf {
        self.config
            .results_root
            .join(mode)
            .join(subject)
            .join(kind_dir)
            .join(mechanism.short_name())
            .join(rate.to_string())
    }
}

/// Analysis runner that writes every requested output and fails chosen subjects
#[derive(Default)]
pub struct ScriptedRunner {
    failing_subjects: HashSet<String>,
    invocations: Arc<Mutex<Vec<AnalysisInvocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subjects whose analysis exits with status 1
    pub fn failing(mut self, subjects: &[&str]) -> Self {
        self.failing_subjects = subjects.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Handle to the invocation log that outlives the runner
    pub fn log(&self) -> Arc<Mutex<Vec<AnalysisInvocation>>> {
        self.invocations.clone()
    }
}

#[async_trait]
impl AnalysisRunner for ScriptedRunner {
    async fn run(&self, invocation: &AnalysisInvocation) -> OrchestratorResult<ExitOutcome> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self.failing_subjects.contains(invocation.key.subject.as_str()) {
            return Ok(ExitOutcome::from_code(1));
        }
        for path in invocation.outputs.paths() {
            tokio::fs::write(path, invocation.key.to_string()).await?;
        }
        Ok(ExitOutcome::from_code(0))
    }
}

/// Builder pattern for creating test orchestrators over a workspace
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    runner: MockAnalysisRunner,
}

impl OrchestratorBuilder {
    /// Create a builder whose runner accepts any call and succeeds
    pub fn new(config: &OrchestratorConfig) -> Self {
        let mut runner = MockAnalysisRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(ExitOutcome::from_code(0)))
            .times(0..);

        Self {
            config: config.clone(),
            runner,
        }
    }

    /// Replace the runner mock with one configured by `setup`
    pub fn with_runner<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockAnalysisRunner),
    {
        let mut runner = MockAnalysisRunner::new();
        setup(&mut runner);
        self.runner = runner;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config = self.config.with_concurrency(concurrency);
        self
    }

    pub fn build(self) -> Orchestrator<RealArtifactStore, MockAnalysisRunner> {
        let store = RealArtifactStore::from_config(&self.config);
        Orchestrator::new(self.config, store, self.runner)
    }
}

/// Common helper functions for tests
pub struct TestHelpers;

impl TestHelpers {
    pub fn real_orchestrator<R: AnalysisRunner + 'static>(config: &OrchestratorConfig, runner: R) -> Orchestrator<RealArtifactStore, R> {
        Orchestrator::new(config.clone(), RealArtifactStore::from_config(config), runner)
    }

    /// Generate variants for every seeded subject with a real store
    pub async fn simulate(workspace: &TestWorkspace, rate: u8, iterations: u32) -> SimulationReport {
        let orchestrator = OrchestratorBuilder::new(&workspace.config).build();
        orchestrator
            .simulate(Mechanism::RandomUniform, TestFixtures::rate(rate), iterations)
            .await
            .unwrap()
    }
}
