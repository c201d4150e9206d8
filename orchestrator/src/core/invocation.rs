//! One external analysis call and its outcome

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use crate::config::AnalysisCommandConfig;
use crate::core::layout::AnalysisOutputs;
use crate::core::resolver::ResolvedUnit;
use shared::{AnalysisMode, UnitKey};

/// Everything needed to launch the anomaly detector for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInvocation {
    pub key: UnitKey,
    pub mode: AnalysisMode,
    pub program: String,
    pub script: PathBuf,
    pub workdir: Option<PathBuf>,
    pub heart_rate: PathBuf,
    pub steps: PathBuf,
    pub outputs: AnalysisOutputs,
    pub random_seed: u64,
    pub inherit_output: bool,
}

impl AnalysisInvocation {
    pub fn new(config: &AnalysisCommandConfig, mode: AnalysisMode, unit: &ResolvedUnit, outputs: AnalysisOutputs) -> Self {
        Self {
            key: unit.key.clone(),
            mode,
            program: config.program.clone(),
            script: config.script_for(mode).to_path_buf(),
            workdir: config.workdir.clone(),
            heart_rate: unit.variant_path.clone(),
            steps: unit.auxiliary_path.clone(),
            outputs,
            random_seed: config.random_seed,
            inherit_output: config.inherit_output,
        }
    }

    /// Arguments after the program, script first
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args = vec![self.script.clone().into_os_string()];
        let mut flag = |name: &str, value: OsString| {
            args.push(OsString::from(name));
            args.push(value);
        };

        flag("--heart_rate", self.heart_rate.clone().into_os_string());
        flag("--steps", self.steps.clone().into_os_string());
        flag("--myphd_id", OsString::from(self.key.subject.as_str()));
        match self.mode {
            AnalysisMode::Offline => {
                flag("--figure", self.outputs.figure.clone().into_os_string());
                flag("--anomalies", self.outputs.anomalies.clone().into_os_string());
                flag("--random_seed", OsString::from(self.random_seed.to_string()));
            }
            AnalysisMode::Online => {
                flag("--figure1", self.outputs.figure.clone().into_os_string());
                flag("--anomalies", self.outputs.anomalies.clone().into_os_string());
                if let Some(alerts) = &self.outputs.alerts {
                    flag("--alerts", alerts.clone().into_os_string());
                }
            }
        }
        args
    }

    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.arguments().iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status of a finished child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// `None` when the child was terminated by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self { code: status.code() }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}
