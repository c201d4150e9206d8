//! Main entry point for the orchestrator binary
//!
//! Builds the configuration from defaults, `RHRAD_*` variables and command
//! line overrides, then runs one of `simulate`, `analyze` or `sweep` with the
//! real artifact store and analysis runner.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;

use orchestrator::{
    services::{RealAnalysisRunner, RealArtifactStore},
    Orchestrator, OrchestratorConfig, OrchestratorResult,
};
use shared::{logging, process_debug, AnalysisMode, Mechanism, MissingRate, ProcessId};

/// Exit status when the run was interrupted before every unit was dispatched
const EXIT_CANCELLED: i32 = 130;
const EXIT_FAILURES: i32 = 1;

/// Missing-data variant generation and batch anomaly-detection runner
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Generates missing-data variants and runs anomaly detection over them")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding `*_hr.csv` and `*_steps.csv` files
    #[arg(long, global = true)]
    pub source_root: Option<PathBuf>,

    /// Root of the generated variant tree
    #[arg(long, global = true)]
    pub missing_root: Option<PathBuf>,

    /// Root of the analysis output tree
    #[arg(long, global = true)]
    pub results_root: Option<PathBuf>,

    /// Maximum number of concurrently running analyses
    #[arg(long, short = 'j', global = true)]
    pub jobs: Option<usize>,

    /// Base seed for variant generation
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Quantile anchor in [0, 1] for MNAR masking
    #[arg(long, global = true)]
    pub mnar_threshold: Option<f64>,

    /// Interpreter used to launch the analysis scripts
    #[arg(long, global = true)]
    pub python: Option<String>,

    #[arg(long, global = true)]
    pub offline_script: Option<PathBuf>,

    #[arg(long, global = true)]
    pub online_script: Option<PathBuf>,

    /// Working directory for analysis processes
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Write the run report as JSON to this path
    #[arg(long, global = true)]
    pub failure_report: Option<PathBuf>,

    /// Capture child output into debug logs instead of forwarding it
    #[arg(long, global = true)]
    pub quiet_children: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate masked variants of every source series
    Simulate {
        #[arg(short = 'm', long)]
        mechanism: Mechanism,

        /// Missing rate in percent
        #[arg(short = 'p', long)]
        rate: MissingRate,

        /// Number of variants per subject
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,
    },
    /// Run the analysis over the variants of one rate
    Analyze {
        #[arg(long)]
        mode: AnalysisMode,

        #[arg(short = 'm', long)]
        mechanism: Mechanism,

        #[arg(short = 'p', long)]
        rate: MissingRate,

        #[arg(short = 'n', long, default_value_t = 5)]
        iterations: u32,
    },
    /// Run the analysis over several rates in one pool
    Sweep {
        #[arg(long)]
        mode: AnalysisMode,

        #[arg(short = 'm', long)]
        mechanism: Mechanism,

        #[arg(long, value_delimiter = ',', default_values = ["10", "20", "30", "40", "50"])]
        rates: Vec<MissingRate>,

        #[arg(short = 'n', long, default_value_t = 5)]
        iterations: u32,
    },
}

/// Apply command line overrides on top of the environment configuration
fn build_config(args: &Args) -> OrchestratorResult<OrchestratorConfig> {
    let mut config = OrchestratorConfig::from_env()?;

    if let Some(path) = &args.source_root {
        config = config.with_source_root(path);
    }
    if let Some(path) = &args.missing_root {
        config = config.with_missing_root(path);
    }
    if let Some(path) = &args.results_root {
        config = config.with_results_root(path);
    }
    if let Some(jobs) = args.jobs {
        config = config.with_concurrency(jobs);
    }
    if let Some(seed) = args.seed {
        config = config.with_base_seed(seed);
    }
    if let Some(threshold) = args.mnar_threshold {
        config = config.with_mnar_threshold(threshold);
    }
    if let Some(python) = &args.python {
        config.analysis.program = python.clone();
    }
    if let Some(script) = &args.offline_script {
        config.analysis.offline_script = script.clone();
    }
    if let Some(script) = &args.online_script {
        config.analysis.online_script = script.clone();
    }
    if args.workdir.is_some() {
        config.analysis.workdir = args.workdir.clone();
    }
    if args.quiet_children {
        config.analysis.inherit_output = false;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize process ID singleton for orchestrator
    ProcessId::init_orchestrator();
    logging::init_tracing_with_level(Some(&args.log_level));

    let config = build_config(&args).context("invalid configuration")?;
    process_debug!(ProcessId::current(), "🔧 {:?}", config);

    let store = RealArtifactStore::from_config(&config);
    let orchestrator = Orchestrator::new(config, store, RealAnalysisRunner::new());

    // Set up graceful shutdown: stop dispatching, let running children finish
    let shutdown_sender = orchestrator.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ProcessId::current(), "Received Ctrl+C, waiting for running analyses");
                let _ = shutdown_sender.send(true);
            }
            Err(err) => {
                logging::log_error(ProcessId::current(), "Signal handling", &err);
            }
        }
    });

    let (failed, cancelled) = match args.command {
        Command::Simulate { mechanism, rate, count } => {
            let report = orchestrator
                .simulate(mechanism, rate, count)
                .await
                .context("simulation aborted")?;
            report.log_summary();
            if let Some(path) = &args.failure_report {
                report.write_json(path).await.context("writing simulation report")?;
            }
            (report.has_failures(), report.cancelled)
        }
        Command::Analyze {
            mode,
            mechanism,
            rate,
            iterations,
        } => {
            let report = orchestrator
                .analyze(mode, mechanism, rate, iterations)
                .await
                .context("analysis aborted")?;
            report.log_summary();
            if let Some(path) = &args.failure_report {
                report.write_json(path).await.context("writing failure report")?;
            }
            (report.has_failures(), report.was_cancelled())
        }
        Command::Sweep {
            mode,
            mechanism,
            rates,
            iterations,
        } => {
            let report = orchestrator
                .sweep(mode, mechanism, &rates, iterations)
                .await
                .context("sweep aborted")?;
            report.log_summary();
            if let Some(path) = &args.failure_report {
                report.write_json(path).await.context("writing failure report")?;
            }
            (report.has_failures(), report.was_cancelled())
        }
    };

    if failed {
        std::process::exit(EXIT_FAILURES);
    }
    if cancelled {
        std::process::exit(EXIT_CANCELLED);
    }

    logging::log_success(ProcessId::current(), "Orchestrator finished");
    Ok(())
}
