//! Integration tests for StageRunner with real child processes.
#![cfg(unix)]

mod common;

use bf_core::stage::template::TemplateVars;
use bf_protocol::result_models::{ExitStatus, StageOutcome};
use bf_protocol::stage_models::StageSpec;
use common::*;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_success_writes_heading_and_output() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));

    let result = runner
        .run_stage(&sh_stage("cc-version", "echo 'cc (GCC) 14.2.0'"))
        .await;

    assert_eq!(result.outcome, StageOutcome::Success);
    assert_eq!(result.exit_status, ExitStatus::Success);
    assert_eq!(result.anchor, "cc-version");

    let mut lines = result.output.lines();
    let heading = lines.next().expect("heading line");
    assert!(heading.starts_with("<a name=\"cc-version\">== cc-version</a> # "));
    assert_eq!(lines.next(), Some("+ sh -c echo 'cc (GCC) 14.2.0'"));
    assert_eq!(lines.next(), Some("cc (GCC) 14.2.0"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_classified_failure() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let spec = sh_stage("btest", "echo 'FAIL 3/456'; exit 1")
        .with_classifier(r"^FAIL (\d+)/\d+", "{1}BFail");

    let result = runner.run_stage(&spec).await;

    assert_eq!(result.outcome, StageOutcome::FailedWithDetail("3BFail".to_string()));
    assert_eq!(result.exit_status, ExitStatus::NonZero(Some(1)));
    assert!(result.output.contains("exit 1\nfailed(btest)\n"));
    assert_eq!(result.failure_tag().as_deref(), Some("3BFail"));
}

#[tokio::test]
async fn test_unmatched_rule_is_plain_failure() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let spec = sh_stage("test-all", "echo 'make: *** [test-all] Error 1' >&2; exit 2")
        .with_classifier(r"^\d+ tests, \d+ assertions, (\d+) failures, (\d+) errors", "{1}F{2}E");

    let result = runner.run_stage(&spec).await;

    assert_eq!(result.outcome, StageOutcome::Failed);
    assert!(result.output.contains("make: *** [test-all] Error 1"));
}

#[tokio::test]
async fn test_timeout_is_never_classified() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_millis(300));
    let spec = sh_stage("test-all", "echo 'FAIL 1/2'; sleep 30")
        .with_classifier(r"^FAIL (\d+)/", "{1}BFail");

    let started = Instant::now();
    let result = runner.run_stage(&spec).await;

    assert_eq!(result.outcome, StageOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(result
        .output
        .contains("|execution time exceeds 0.3 seconds. (CommandTimeout)"));
    assert!(result.output.contains("failed(test-all CommandTimeout)"));
    assert_eq!(result.failure_tag().as_deref(), Some("timeout(test-all)"));
}

#[tokio::test]
async fn test_missing_tool_fails_to_start() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let spec = StageSpec::new("bison-version", ["nonexistent-bison-xyz", "--version"]);

    let result = runner.run_stage(&spec).await;

    assert_eq!(result.outcome, StageOutcome::Failed);
    assert_eq!(result.exit_status, ExitStatus::NeverStarted);
    assert!(result.output.starts_with("<a name=\"bison-version\">"));
    assert!(result.output.contains("tool not found"));
}

#[tokio::test]
async fn test_missing_build_dir_fails_to_start() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let spec = sh_stage("miniruby", "echo unreachable").in_build_dir();

    let result = runner.run_stage(&spec).await;

    assert_eq!(result.exit_status, ExitStatus::NeverStarted);
    assert!(!result.output.contains("\nunreachable\n"));
}

#[tokio::test]
async fn test_build_dir_stage_runs_inside_checkout() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("ruby")).expect("Failed to create build dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));

    let result = runner
        .run_stage(&sh_stage("showflags", "basename \"$(pwd)\"").in_build_dir())
        .await;

    assert_eq!(result.outcome, StageOutcome::Success);
    assert!(result.output.ends_with("ruby\n"));
}

#[tokio::test]
async fn test_template_variables_are_expanded() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let vars = TemplateVars::from([("make".to_string(), "echo".to_string())]);
    let runner = test_runner(dir.path(), Duration::from_secs(30)).with_vars(vars);

    let result = runner
        .run_stage(&StageSpec::new("main", ["{make}", "main"]))
        .await;

    assert_eq!(result.outcome, StageOutcome::Success);
    assert!(result.output.contains("+ echo main\nmain\n"));
}

#[tokio::test]
async fn test_unknown_template_variable_fails_to_start() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));

    let result = runner
        .run_stage(&StageSpec::new("main", ["{nmake}", "main"]))
        .await;

    assert_eq!(result.exit_status, ExitStatus::NeverStarted);
    assert!(result.output.contains("unknown placeholder"));
}

#[tokio::test]
async fn test_advisory_and_gating_flags_are_carried() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));

    let advisory = runner
        .run_stage(&sh_stage("test-knownbug", "exit 1").advisory())
        .await;
    let gating = runner.run_stage(&sh_stage("configure", "exit 0").gating()).await;

    assert!(!advisory.counts_toward_failure);
    assert!(!advisory.is_counted_failure());
    assert!(gating.gating);
}
