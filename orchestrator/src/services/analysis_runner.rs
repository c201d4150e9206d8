//! Real analysis runner
//!
//! Launches the anomaly-detection script as a child process and waits for
//! it. The runner never retries and never kills a running child.

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::invocation::{AnalysisInvocation, ExitOutcome};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::process_output_handler::{configure_child_stdio, spawn_output_consumers};
use crate::traits::AnalysisRunner;
use shared::{process_debug, ProcessId};

#[derive(Debug, Default, Clone)]
pub struct RealAnalysisRunner;

impl RealAnalysisRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(invocation: &AnalysisInvocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(invocation.arguments());
        if let Some(workdir) = &invocation.workdir {
            cmd.current_dir(workdir);
        }
        configure_child_stdio(&mut cmd, invocation.inherit_output, &invocation.key.to_string());
        cmd
    }
}

#[async_trait]
impl AnalysisRunner for RealAnalysisRunner {
    async fn run(&self, invocation: &AnalysisInvocation) -> OrchestratorResult<ExitOutcome> {
        let mut cmd = Self::build_command(invocation);
        process_debug!(ProcessId::current(), "🚀 {}", invocation.command_line());

        let child = cmd.spawn().map_err(|e| OrchestratorError::AnalysisFailure {
            key: invocation.key.clone(),
            reason: format!("failed to spawn '{}': {}", invocation.program, e),
        })?;
        let mut child = spawn_output_consumers(child, invocation.key.to_string());

        let status = child.wait().await.map_err(|e| OrchestratorError::AnalysisFailure {
            key: invocation.key.clone(),
            reason: format!("failed to wait for child: {e}"),
        })?;

        let outcome = ExitOutcome::from(status);
        process_debug!(ProcessId::current(), "🏁 {} finished with {}", invocation.key, outcome);
        Ok(outcome)
    }
}
