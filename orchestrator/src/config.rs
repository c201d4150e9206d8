//! Run configuration
//!
//! Every component receives its paths and limits from an explicit
//! [`OrchestratorConfig`]; nothing is derived from the working directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{OrchestratorError, OrchestratorResult};
use shared::AnalysisMode;

/// How to launch the external anomaly-detection scripts
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCommandConfig {
    /// Interpreter or executable to launch
    pub program: String,
    /// Script passed as first argument in offline mode
    pub offline_script: PathBuf,
    /// Script passed as first argument in online mode
    pub online_script: PathBuf,
    /// Working directory for child processes
    pub workdir: Option<PathBuf>,
    /// Seed forwarded to the offline script
    pub random_seed: u64,
    /// Forward child stdout/stderr to ours instead of draining into debug logs
    pub inherit_output: bool,
}

impl Default for AnalysisCommandConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            offline_script: PathBuf::from("Metrics/rhrad_offline.py"),
            online_script: PathBuf::from("Metrics/rhrad_online_24hr_alerts_v7.py"),
            workdir: None,
            random_seed: 1,
            inherit_output: true,
        }
    }
}

impl AnalysisCommandConfig {
    pub fn script_for(&self, mode: AnalysisMode) -> &Path {
        match mode {
            AnalysisMode::Offline => &self.offline_script,
            AnalysisMode::Online => &self.online_script,
        }
    }
}

/// Top-level configuration passed by reference through every component
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Directory holding `*_hr.csv` and `*_steps.csv` source files
    pub source_root: PathBuf,
    /// Root of the generated variant tree
    pub missing_root: PathBuf,
    /// Root of the analysis output tree
    pub results_root: PathBuf,
    pub analysis: AnalysisCommandConfig,
    /// Maximum number of concurrently running analysis processes
    pub concurrency: usize,
    /// Base seed for per-iteration masking seeds
    pub base_seed: u64,
    /// Quantile anchor for value-dependent masking, in [0, 1]
    pub mnar_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("Data/COVID-19-Wearables"),
            missing_root: PathBuf::from("Data/COVID-19-Wearables-Missing"),
            results_root: PathBuf::from("Results/RHR"),
            analysis: AnalysisCommandConfig::default(),
            concurrency: default_concurrency(),
            base_seed: 1,
            mnar_threshold: 0.0,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl OrchestratorConfig {
    pub const ENV_SOURCE_ROOT: &'static str = "RHRAD_SOURCE_ROOT";
    pub const ENV_MISSING_ROOT: &'static str = "RHRAD_MISSING_ROOT";
    pub const ENV_RESULTS_ROOT: &'static str = "RHRAD_RESULTS_ROOT";
    pub const ENV_PYTHON: &'static str = "RHRAD_PYTHON";
    pub const ENV_JOBS: &'static str = "RHRAD_JOBS";
    pub const ENV_SEED: &'static str = "RHRAD_SEED";

    /// Defaults overridden by `RHRAD_*` variables (a `.env` file is loaded first if present)
    pub fn from_env() -> OrchestratorResult<Self> {
        // Silently ignored when no .env file exists
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> OrchestratorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(Self::ENV_SOURCE_ROOT) {
            config.source_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(Self::ENV_MISSING_ROOT) {
            config.missing_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(Self::ENV_RESULTS_ROOT) {
            config.results_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(Self::ENV_PYTHON) {
            config.analysis.program = value;
        }
        if let Some(value) = lookup(Self::ENV_JOBS) {
            config.concurrency = parse_var(Self::ENV_JOBS, &value)?;
        }
        if let Some(value) = lookup(Self::ENV_SEED) {
            config.base_seed = parse_var(Self::ENV_SEED, &value)?;
        }
        Ok(config)
    }

    pub fn with_source_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_root = path.into();
        self
    }

    pub fn with_missing_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_root = path.into();
        self
    }

    pub fn with_results_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_root = path.into();
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisCommandConfig) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn with_mnar_threshold(mut self, threshold: f64) -> Self {
        self.mnar_threshold = threshold;
        self
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.concurrency == 0 {
            return Err(OrchestratorError::config("concurrency must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.mnar_threshold) {
            return Err(OrchestratorError::config(format!(
                "mnar_threshold must be within [0, 1], got {}",
                self.mnar_threshold
            )));
        }
        if self.analysis.program.trim().is_empty() {
            return Err(OrchestratorError::config("analysis program must not be empty"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> OrchestratorResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OrchestratorError::config(format!("{name}={value} is not a valid value")))
}
