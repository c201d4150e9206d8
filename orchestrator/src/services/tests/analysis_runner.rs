//! Tests for RealAnalysisRunner
//!
//! Real children are launched through `sh`, so these tests are unix-only.

#![cfg(unix)]

use std::path::PathBuf;

use super::common::{test_key, with_timeout, write_script};
use crate::config::AnalysisCommandConfig;
use crate::core::invocation::AnalysisInvocation;
use crate::core::layout::ArtifactLayout;
use crate::core::resolver::ResolvedUnit;
use crate::error::OrchestratorError;
use crate::services::analysis_runner::RealAnalysisRunner;
use crate::traits::AnalysisRunner;
use shared::AnalysisMode;

/// Creates the file passed after `--figure`
const TOUCH_FIGURE: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --figure) mkdir -p "$(dirname "$2")"; echo figure > "$2"; shift ;;
  esac
  shift
done
echo analysed
"#;

fn invocation(dir: &std::path::Path, program: &str, script: PathBuf) -> AnalysisInvocation {
    let unit = ResolvedUnit {
        key: test_key("P1", 10, 1),
        variant_path: dir.join("P1_hr_MCAR_10_1.csv"),
        auxiliary_path: dir.join("P1_steps.csv"),
    };
    let config = AnalysisCommandConfig {
        program: program.to_string(),
        offline_script: script,
        inherit_output: false,
        ..AnalysisCommandConfig::default()
    };
    let outputs = ArtifactLayout::new(dir.join("m"), dir.join("r")).analysis_outputs(&unit.key, AnalysisMode::Offline);
    AnalysisInvocation::new(&config, AnalysisMode::Offline, &unit, outputs)
}

#[tokio::test]
async fn test_zero_exit_is_success_and_arguments_arrive() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "ok.sh", TOUCH_FIGURE);
    let invocation = invocation(dir.path(), "sh", script);

    let outcome = with_timeout(RealAnalysisRunner::new().run(&invocation)).await.unwrap().unwrap();

    assert!(outcome.success());
    assert_eq!(std::fs::read_to_string(&invocation.outputs.figure).unwrap().trim(), "figure");
}

#[tokio::test]
async fn test_non_zero_exit_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "fail.sh", "echo boom >&2\nexit 3\n");
    let invocation = invocation(dir.path(), "sh", script);

    let outcome = with_timeout(RealAnalysisRunner::new().run(&invocation)).await.unwrap().unwrap();

    assert!(!outcome.success());
    assert_eq!(outcome.code, Some(3));
}

#[tokio::test]
async fn test_missing_program_is_analysis_failure() {
    let dir = tempfile::tempdir().unwrap();
    let invocation = invocation(dir.path(), "rhrad-no-such-interpreter", dir.path().join("x.py"));

    let result = RealAnalysisRunner::new().run(&invocation).await;

    match result {
        Err(OrchestratorError::AnalysisFailure { key, reason }) => {
            assert_eq!(key, invocation.key);
            assert!(reason.contains("failed to spawn"));
        }
        other => panic!("expected AnalysisFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_workdir_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "pwd.sh", "pwd > where.txt\n");
    let mut invocation = invocation(dir.path(), "sh", script);
    invocation.workdir = Some(dir.path().to_path_buf());

    let outcome = with_timeout(RealAnalysisRunner::new().run(&invocation)).await.unwrap().unwrap();

    assert!(outcome.success());
    assert!(dir.path().join("where.txt").exists());
}
