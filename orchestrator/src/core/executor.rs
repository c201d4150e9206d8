//! Batch executor
//!
//! A fixed pool of workers drains a shared queue of resolved units. Each
//! worker prepares the outputs of its unit, launches one child and waits for
//! it before taking the next unit. Cancellation stops dispatch; children
//! already running are allowed to finish.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::config::AnalysisCommandConfig;
use crate::core::invocation::AnalysisInvocation;
use crate::core::ledger::FailureLedger;
use crate::core::resolver::ResolvedUnit;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{AnalysisRunner, ArtifactStore};
use shared::{process_debug, process_error, process_info, process_warn, AnalysisMode, ProcessId, UnitKey};

/// Lifecycle of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Failed(_))
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Pending => f.write_str("pending"),
            UnitState::Running => f.write_str("running"),
            UnitState::Succeeded => f.write_str("succeeded"),
            UnitState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// A unit that ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub key: UnitKey,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Units still queued when cancellation was observed
    pub not_dispatched: usize,
    pub failures: Vec<UnitFailure>,
}

impl BatchOutcome {
    pub fn dispatched(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// State shared by all workers of one batch
struct WorkerContext<S, R> {
    store: Arc<S>,
    runner: Arc<R>,
    ledger: Arc<FailureLedger>,
    analysis: AnalysisCommandConfig,
    mode: AnalysisMode,
    queue: Arc<Mutex<VecDeque<ResolvedUnit>>>,
}

#[derive(Default)]
struct WorkerTally {
    succeeded: usize,
    failures: Vec<UnitFailure>,
}

pub struct BatchExecutor<S, R> {
    store: Arc<S>,
    runner: Arc<R>,
    ledger: Arc<FailureLedger>,
    analysis: AnalysisCommandConfig,
    mode: AnalysisMode,
    concurrency: usize,
}

impl<S, R> BatchExecutor<S, R>
where
    S: ArtifactStore + 'static,
    R: AnalysisRunner + 'static,
{
    pub fn new(store: Arc<S>, runner: Arc<R>, analysis: AnalysisCommandConfig, mode: AnalysisMode) -> Self {
        Self {
            store,
            runner,
            ledger: Arc::new(FailureLedger::new()),
            analysis,
            mode,
            concurrency: 1,
        }
    }

    /// Set the worker count; values below 1 are raised to 1 (fluent API)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Record failures into an existing ledger (fluent API)
    pub fn with_ledger(mut self, ledger: Arc<FailureLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> Arc<FailureLedger> {
        self.ledger.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Execute `units` with at most `concurrency` children alive at once
    ///
    /// Units are dispatched in input order. Once `cancel` reads `true`, no
    /// further unit is dispatched and the remaining ones are reported as not
    /// dispatched.
    pub async fn run(&self, units: Vec<ResolvedUnit>, cancel: watch::Receiver<bool>) -> OrchestratorResult<BatchOutcome> {
        let total = units.len();
        if total == 0 {
            return Ok(BatchOutcome::default());
        }

        for unit in &units {
            process_debug!(ProcessId::current(), "{} {}", unit.key, UnitState::Pending);
        }
        let queue = Arc::new(Mutex::new(units.into_iter().collect::<VecDeque<_>>()));
        let workers = self.concurrency.min(total);
        process_info!(
            ProcessId::current(),
            "⚙️ Dispatching {} units ({} mode) across {} workers",
            total,
            self.mode,
            workers
        );

        let handles = (0..workers).map(|n| {
            let context = WorkerContext {
                store: self.store.clone(),
                runner: self.runner.clone(),
                ledger: self.ledger.clone(),
                analysis: self.analysis.clone(),
                mode: self.mode,
                queue: queue.clone(),
            };
            tokio::spawn(worker_loop(n as u32 + 1, context, cancel.clone()))
        });

        let mut outcome = BatchOutcome::default();
        for result in join_all(handles).await {
            let tally = match result {
                Ok(tally) => tally,
                Err(e) => {
                    process_error!(ProcessId::current(), "💥 Worker task ended abnormally: {}", e);
                    continue;
                }
            };
            outcome.succeeded += tally.succeeded;
            outcome.failed += tally.failures.len();
            outcome.failures.extend(tally.failures);
        }
        outcome.failures.sort_by(|a, b| a.key.cmp(&b.key));
        outcome.not_dispatched = queue.lock().await.len();

        if outcome.not_dispatched > 0 {
            process_warn!(
                ProcessId::current(),
                "🛑 Cancelled: {} units not dispatched",
                outcome.not_dispatched
            );
        }
        Ok(outcome)
    }
}

async fn worker_loop<S, R>(id: u32, context: WorkerContext<S, R>, cancel: watch::Receiver<bool>) -> WorkerTally
where
    S: ArtifactStore,
    R: AnalysisRunner,
{
    let worker = &ProcessId::Worker(id);
    let mut tally = WorkerTally::default();

    loop {
        if *cancel.borrow() {
            process_debug!(worker, "cancel observed, stopping dispatch");
            break;
        }
        let Some(unit) = context.queue.lock().await.pop_front() else {
            break;
        };
        process_debug!(worker, "{} {}", unit.key, UnitState::Running);

        let state = match AssertUnwindSafe(execute_unit(&context, &unit)).catch_unwind().await {
            Ok(Ok(())) => UnitState::Succeeded,
            Ok(Err(e)) => UnitState::Failed(e.to_string()),
            Err(panic) => UnitState::Failed(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        match state {
            UnitState::Failed(reason) => {
                process_warn!(worker, "❌ {} failed: {}", unit.key, reason);
                context
                    .ledger
                    .record(unit.key.subject.clone(), unit.key.rate, unit.key.iteration)
                    .await;
                tally.failures.push(UnitFailure { key: unit.key, reason });
            }
            _ => {
                process_info!(worker, "✅ {} {}", unit.key, state);
                tally.succeeded += 1;
            }
        }
    }
    tally
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

async fn execute_unit<S, R>(context: &WorkerContext<S, R>, unit: &ResolvedUnit) -> OrchestratorResult<()>
where
    S: ArtifactStore,
    R: AnalysisRunner,
{
    let outputs = context.store.prepare_analysis_outputs(&unit.key, context.mode).await?;
    let invocation = AnalysisInvocation::new(&context.analysis, context.mode, unit, outputs);

    let outcome = context.runner.run(&invocation).await?;
    if outcome.success() {
        Ok(())
    } else {
        Err(OrchestratorError::AnalysisFailure {
            key: unit.key.clone(),
            reason: outcome.to_string(),
        })
    }
}
