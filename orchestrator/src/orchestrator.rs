//! Main orchestrator implementation
//!
//! Wires the variant generator, artifact store, resolver, executor and
//! failure ledger into the three user-facing operations: `simulate`,
//! `analyze` and `sweep`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use shared::{
    logging, process_debug, process_error, process_info, process_warn, AnalysisMode, ArtifactKind, Iteration,
    Mechanism, MissingRate, ProcessId, SubjectId, UnitKey,
};

use crate::config::OrchestratorConfig;
use crate::core::executor::{BatchExecutor, UnitFailure};
use crate::core::generator::VariantGenerator;
use crate::core::ledger::FailureLedger;
use crate::core::resolver::{self, UnmatchedVariant};
use crate::core::series::SourceSeries;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{AnalysisRunner, ArtifactStore};

/// A source file that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// A variant that could not be generated or stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantIssue {
    pub key: UnitKey,
    pub reason: String,
}

/// Result of a `simulate` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub mechanism: Mechanism,
    pub rate: MissingRate,
    pub sources: usize,
    pub written: Vec<PathBuf>,
    pub skipped_sources: Vec<SkippedSource>,
    pub failed_variants: Vec<VariantIssue>,
    pub cancelled: bool,
}

impl SimulationReport {
    fn new(mechanism: Mechanism, rate: MissingRate) -> Self {
        Self {
            mechanism,
            rate,
            sources: 0,
            written: Vec::new(),
            skipped_sources: Vec::new(),
            failed_variants: Vec::new(),
            cancelled: false,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.skipped_sources.is_empty() || !self.failed_variants.is_empty()
    }

    pub fn log_summary(&self) {
        let process_id = ProcessId::current();
        logging::log_progress(
            process_id,
            "Simulation",
            &format!(
                "{} {}%: {} variants written from {} sources",
                self.mechanism,
                self.rate,
                self.written.len(),
                self.sources
            ),
        );
        for skipped in &self.skipped_sources {
            process_warn!(process_id, "⚠️ Skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        for issue in &self.failed_variants {
            process_warn!(process_id, "⚠️ Variant {} not written: {}", issue.key, issue.reason);
        }
    }

    /// Persist the report as pretty JSON
    pub async fn write_json(&self, path: &Path) -> OrchestratorResult<()> {
        write_json_report(self, path).await
    }
}

/// Result of an `analyze` or `sweep` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: AnalysisMode,
    pub mechanism: Mechanism,
    pub rates: Vec<MissingRate>,
    pub iterations: u32,
    pub matched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_dispatched: usize,
    pub unmatched: Vec<UnmatchedVariant>,
    pub failures: Vec<UnitFailure>,
    /// Failure ledger contents: subject -> (rate, iteration) pairs
    pub failed_by_subject: BTreeMap<SubjectId, Vec<(MissingRate, Iteration)>>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_by_subject.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        self.not_dispatched > 0
    }

    pub fn log_summary(&self) {
        let process_id = ProcessId::current();
        logging::log_progress(
            process_id,
            "Analysis",
            &format!(
                "{} {} over rates {:?}: {} matched, {} succeeded, {} failed, {} not dispatched, {} unmatched",
                self.mode,
                self.mechanism,
                self.rates.iter().map(|r| r.percent()).collect::<Vec<_>>(),
                self.matched,
                self.succeeded,
                self.failed,
                self.not_dispatched,
                self.unmatched.len()
            ),
        );

        if self.failed_by_subject.is_empty() {
            return;
        }
        process_error!(
            process_id,
            "❌ Failed units for {} subjects",
            self.failed_by_subject.len()
        );
        for (subject, units) in &self.failed_by_subject {
            let detail = units
                .iter()
                .map(|(rate, iteration)| format!("{rate}%#{iteration}"))
                .collect::<Vec<_>>()
                .join(", ");
            process_error!(process_id, "   {}: {}", subject, detail);
        }
    }

    /// Persist the report as pretty JSON
    pub async fn write_json(&self, path: &Path) -> OrchestratorResult<()> {
        write_json_report(self, path).await
    }
}

async fn write_json_report<T: Serialize>(report: &T, path: &Path) -> OrchestratorResult<()> {
    let json = serde_json::to_vec_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OrchestratorError::file_system("create_dir_all", parent, e))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| OrchestratorError::file_system("write", path, e))
}

/// Main orchestrator over an artifact store and an analysis runner
pub struct Orchestrator<S, R>
where
    S: ArtifactStore + 'static,
    R: AnalysisRunner + 'static,
{
    config: OrchestratorConfig,
    store: Arc<S>,
    runner: Arc<R>,
    generator: VariantGenerator,

    /// Shutdown signal; `true` stops dispatch of further work
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S, R> Orchestrator<S, R>
where
    S: ArtifactStore + 'static,
    R: AnalysisRunner + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(config: OrchestratorConfig, store: S, runner: R) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            generator: VariantGenerator::from_config(&config),
            config,
            store: Arc::new(store),
            runner: Arc::new(runner),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Replace the variant generator (fluent API)
    pub fn with_generator(mut self, generator: VariantGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Sender that cancels the current and any later run when set to `true`
    pub fn get_shutdown_sender(&self) -> Arc<watch::Sender<bool>> {
        self.shutdown_tx.clone()
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Generate `count` variants of every source series and persist them
    pub async fn simulate(&self, mechanism: Mechanism, rate: MissingRate, count: u32) -> OrchestratorResult<SimulationReport> {
        let sources = resolver::discover_sources(&self.config).await?;
        let mut report = SimulationReport::new(mechanism, rate);
        report.sources = sources.len();
        logging::log_startup(
            ProcessId::current(),
            &format!("simulation {mechanism} {rate}% x{count} over {} sources", sources.len()),
        );

        for path in sources {
            if self.is_cancelled() {
                report.cancelled = true;
                logging::log_shutdown(ProcessId::current(), "simulation cancelled");
                break;
            }

            let series = match SourceSeries::read_csv(&path).await {
                Ok(series) => series,
                Err(e) => {
                    logging::log_error(ProcessId::current(), &format!("Reading {}", path.display()), &e);
                    report.skipped_sources.push(SkippedSource {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            process_debug!(ProcessId::current(), "📄 {} rows for {}", series.len(), series.subject());

            for iteration in Iteration::range(count) {
                let key = UnitKey::new(series.subject().clone(), mechanism, rate, iteration);
                match self.generate_and_store(&series, &key).await {
                    Ok(written) => report.written.push(written),
                    Err(e @ OrchestratorError::MalformedSource { .. }) => {
                        logging::log_error(ProcessId::current(), &format!("Reading {}", path.display()), &e);
                        report.skipped_sources.push(SkippedSource {
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                        break;
                    }
                    Err(e) => {
                        process_warn!(ProcessId::current(), "⚠️ {} skipped: {}", key, e);
                        report.failed_variants.push(VariantIssue {
                            key,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    async fn generate_and_store(&self, series: &SourceSeries, key: &UnitKey) -> OrchestratorResult<PathBuf> {
        let variant = self
            .generator
            .generate_one(series, key.mechanism, key.rate, key.iteration)?;
        let bytes = variant.to_csv_bytes()?;
        self.store.put(variant.key(), ArtifactKind::VariantCsv, &bytes).await
    }

    /// Run the analysis for iterations `1..=iterations` of one rate
    pub async fn analyze(
        &self,
        mode: AnalysisMode,
        mechanism: Mechanism,
        rate: MissingRate,
        iterations: u32,
    ) -> OrchestratorResult<RunReport> {
        self.sweep(mode, mechanism, &[rate], iterations).await
    }

    /// Run the analysis over several rates in one bounded pool
    pub async fn sweep(
        &self,
        mode: AnalysisMode,
        mechanism: Mechanism,
        rates: &[MissingRate],
        iterations: u32,
    ) -> OrchestratorResult<RunReport> {
        if rates.is_empty() {
            return Err(OrchestratorError::config("at least one missing rate is required"));
        }
        if iterations == 0 {
            return Err(OrchestratorError::config("iterations must be at least 1"));
        }

        let auxiliary = resolver::discover_auxiliary(&self.config).await?;
        let mut variants = Vec::new();
        for rate in rates {
            for iteration in Iteration::range(iterations) {
                match resolver::discover_variants(&self.config, mechanism, *rate, iteration).await {
                    Ok(found) => variants.extend(found),
                    Err(e) => process_warn!(
                        ProcessId::current(),
                        "⚠️ Skipping {} {}% iteration {}: {}",
                        mechanism,
                        rate,
                        iteration,
                        e
                    ),
                }
            }
        }
        process_info!(
            ProcessId::current(),
            "🔎 Found {} variants and {} auxiliary files",
            variants.len(),
            auxiliary.len()
        );

        let resolution = resolver::resolve(variants, &auxiliary);
        let matched = resolution.matched.len();

        let ledger = Arc::new(FailureLedger::new());
        let executor = BatchExecutor::new(self.store.clone(), self.runner.clone(), self.config.analysis.clone(), mode)
            .with_concurrency(self.config.concurrency)
            .with_ledger(ledger.clone());
        let outcome = executor.run(resolution.matched, self.shutdown_rx.clone()).await?;

        Ok(RunReport {
            mode,
            mechanism,
            rates: rates.to_vec(),
            iterations,
            matched,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            not_dispatched: outcome.not_dispatched,
            unmatched: resolution.unmatched,
            failures: outcome.failures,
            failed_by_subject: ledger.summary().await,
        })
    }
}
