//! End-to-end scenarios over a temporary data tree
//!
//! Variants are generated and stored for real; the analysis step is played
//! by a scripted runner, or by `sh` scripts on unix.

mod common;

use std::collections::BTreeMap;

use common::{ScriptedRunner, TestFixtures, TestHelpers, TestWorkspace};
use orchestrator::core::layout::{ANOMALIES_DIR, FIGURES_DIR};
use orchestrator::core::series::SourceSeries;
use shared::{AnalysisMode, Mechanism};

const MCAR: Mechanism = Mechanism::RandomUniform;

#[tokio::test]
async fn test_simulate_writes_full_length_variants() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&[TestFixtures::SUBJECT_A]);

    let report = TestHelpers::simulate(&workspace, 20, 2).await;
    assert_eq!(report.written.len(), 2);

    let path = workspace
        .config
        .missing_root
        .join("MCAR/20/1")
        .join(format!("{}_hr_MCAR_20_1.csv", TestFixtures::SUBJECT_A));
    assert_eq!(report.written[0], path);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, ["user", "datetime", "heartrate", "removed"]);

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), TestFixtures::DEFAULT_ROWS);
    let removed = records.iter().filter(|r| &r[3] == "true").count();
    assert_eq!(removed, TestFixtures::DEFAULT_ROWS / 5);
    assert!(records.iter().filter(|r| &r[3] == "true").all(|r| r[2].is_empty()));

    // The variant is itself a readable heart-rate series of the same subject
    let reread = SourceSeries::read_csv(&path).await.unwrap();
    assert_eq!(reread.subject().as_str(), TestFixtures::SUBJECT_A);
    assert_eq!(reread.len(), TestFixtures::DEFAULT_ROWS);
}

#[tokio::test]
async fn test_partial_failure_is_isolated_to_one_subject() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&TestFixtures::subjects());
    TestHelpers::simulate(&workspace, 10, 1).await;

    let runner = ScriptedRunner::new().failing(&[TestFixtures::SUBJECT_B]);
    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, runner);
    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 1)
        .await
        .unwrap();

    assert_eq!(report.matched, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(report.has_failures());

    let expected = BTreeMap::from([(
        TestFixtures::subject(TestFixtures::SUBJECT_B),
        vec![(TestFixtures::rate(10), TestFixtures::iteration(1))],
    )]);
    assert_eq!(report.failed_by_subject, expected);

    for subject in [TestFixtures::SUBJECT_A, TestFixtures::SUBJECT_C] {
        let figures = workspace.results_dir("offline", subject, FIGURES_DIR, MCAR, TestFixtures::rate(10));
        assert_eq!(TestWorkspace::files_in(&figures).len(), 1, "{subject} figure");
    }
}

#[tokio::test]
async fn test_unmatched_subject_is_reported_not_failed() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&[TestFixtures::SUBJECT_A, TestFixtures::SUBJECT_B]);
    workspace.write_source(TestFixtures::SUBJECT_C, TestFixtures::DEFAULT_ROWS);
    TestHelpers::simulate(&workspace, 10, 1).await;

    let runner = ScriptedRunner::new();
    let log = runner.log();
    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, runner);
    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 1)
        .await
        .unwrap();

    assert_eq!(report.matched, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].key.subject.as_str(), TestFixtures::SUBJECT_C);
    assert!(!report.has_failures());

    let invoked: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .map(|inv| inv.key.subject.to_string())
        .collect();
    assert!(!invoked.contains(&TestFixtures::SUBJECT_C.to_string()));
}

#[tokio::test]
async fn test_rerun_leaves_exactly_one_set_of_outputs() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&TestFixtures::subjects());
    TestHelpers::simulate(&workspace, 10, 1).await;
    let rate = TestFixtures::rate(10);

    for _ in 0..2 {
        let orchestrator = TestHelpers::real_orchestrator(&workspace.config, ScriptedRunner::new());
        let report = orchestrator.analyze(AnalysisMode::Online, MCAR, rate, 1).await.unwrap();
        assert_eq!(report.succeeded, 3);
    }

    for subject in TestFixtures::subjects() {
        let figures = workspace.results_dir("online", subject, FIGURES_DIR, MCAR, rate);
        let anomalies = workspace.results_dir("online", subject, ANOMALIES_DIR, MCAR, rate);
        assert_eq!(TestWorkspace::files_in(&figures).len(), 1);
        // anomalies + alerts
        assert_eq!(TestWorkspace::files_in(&anomalies).len(), 2);
    }
}

#[tokio::test]
async fn test_failed_rerun_removes_stale_outputs() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&[TestFixtures::SUBJECT_A]);
    TestHelpers::simulate(&workspace, 10, 1).await;
    let rate = TestFixtures::rate(10);
    let figures = workspace.results_dir("offline", TestFixtures::SUBJECT_A, FIGURES_DIR, MCAR, rate);

    let first = TestHelpers::real_orchestrator(&workspace.config, ScriptedRunner::new());
    first.analyze(AnalysisMode::Offline, MCAR, rate, 1).await.unwrap();
    assert_eq!(TestWorkspace::files_in(&figures).len(), 1);

    let second = TestHelpers::real_orchestrator(
        &workspace.config,
        ScriptedRunner::new().failing(&[TestFixtures::SUBJECT_A]),
    );
    let report = second.analyze(AnalysisMode::Offline, MCAR, rate, 1).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(TestWorkspace::files_in(&figures).is_empty());
}

#[tokio::test]
async fn test_cancellation_before_dispatch() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&TestFixtures::subjects());
    TestHelpers::simulate(&workspace, 10, 1).await;

    let runner = ScriptedRunner::new();
    let log = runner.log();
    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, runner);
    orchestrator.get_shutdown_sender().send(true).unwrap();

    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 1)
        .await
        .unwrap();

    assert_eq!(report.matched, 3);
    assert_eq!(report.not_dispatched, 3);
    assert!(report.was_cancelled());
    assert!(!report.has_failures());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sweep_covers_every_generated_rate() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&[TestFixtures::SUBJECT_A, TestFixtures::SUBJECT_B]);
    TestHelpers::simulate(&workspace, 10, 2).await;
    TestHelpers::simulate(&workspace, 20, 2).await;

    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, ScriptedRunner::new());
    let rates = [TestFixtures::rate(10), TestFixtures::rate(20), TestFixtures::rate(30)];
    let report = orchestrator
        .sweep(AnalysisMode::Offline, MCAR, &rates, 2)
        .await
        .unwrap();

    // Rate 30 was never generated; its directories are skipped
    assert_eq!(report.matched, 8);
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.rates.len(), 3);
}

#[tokio::test]
async fn test_unreadable_variant_directory_is_skipped() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&[TestFixtures::SUBJECT_A, TestFixtures::SUBJECT_B]);
    TestHelpers::simulate(&workspace, 10, 1).await;

    // A plain file where iteration 2's directory should be
    std::fs::write(workspace.config.missing_root.join("MCAR/10/2"), "not a directory").unwrap();

    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, ScriptedRunner::new());
    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 2)
        .await
        .unwrap();

    assert_eq!(report.matched, 2);
    assert_eq!(report.succeeded, 2);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_failure_report_round_trips_as_json() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&TestFixtures::subjects());
    TestHelpers::simulate(&workspace, 10, 1).await;

    let runner = ScriptedRunner::new().failing(&[TestFixtures::SUBJECT_B]);
    let orchestrator = TestHelpers::real_orchestrator(&workspace.config, runner);
    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 1)
        .await
        .unwrap();

    let path = workspace.dir.path().join("reports/failures.json");
    report.write_json(&path).await.unwrap();

    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["mode"], "offline");
    assert_eq!(
        json["failed_by_subject"][TestFixtures::SUBJECT_B],
        serde_json::json!([[10, 1]])
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_child_processes_with_shell_detector() {
    let workspace = TestWorkspace::new();
    workspace.seed_subjects(&TestFixtures::subjects());
    TestHelpers::simulate(&workspace, 10, 1).await;

    let script = workspace.dir.path().join("detector.sh");
    std::fs::write(
        &script,
        format!(
            r#"
id=""; fig=""; anom=""
while [ $# -gt 0 ]; do
  case "$1" in
    --myphd_id) id="$2"; shift ;;
    --figure) fig="$2"; shift ;;
    --anomalies) anom="$2"; shift ;;
  esac
  shift
done
[ "$id" = "{failing}" ] && exit 1
echo figure > "$fig"
echo anomalies > "$anom"
"#,
            failing = TestFixtures::SUBJECT_C
        ),
    )
    .unwrap();

    let mut config = workspace.config.clone();
    config.analysis.program = "sh".to_string();
    config.analysis.offline_script = script;
    config.analysis.inherit_output = false;

    let orchestrator = TestHelpers::real_orchestrator(&config, orchestrator::services::RealAnalysisRunner::new());
    let report = orchestrator
        .analyze(AnalysisMode::Offline, MCAR, TestFixtures::rate(10), 1)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.failed_by_subject.keys().map(|s| s.as_str()).collect::<Vec<_>>(),
        vec![TestFixtures::SUBJECT_C]
    );
    let anomalies = workspace.results_dir("offline", TestFixtures::SUBJECT_A, ANOMALIES_DIR, MCAR, TestFixtures::rate(10));
    assert_eq!(TestWorkspace::files_in(&anomalies).len(), 1);
}
