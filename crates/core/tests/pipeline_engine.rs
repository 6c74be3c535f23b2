//! Integration tests for PipelineEngine.
//!
//! These tests verify that the PipelineEngine correctly:
//! - Executes stages sequentially, in declared order
//! - Skips every remaining stage after a gating failure
//! - Derives the overall result from counting stages only
//! - Composes the title and the structured record at finalization

mod common;

use bf_core::engine::PipelineEngine;
use bf_core::state::run::create_run;
use bf_protocol::result_models::StageOutcome;
use bf_protocol::run_models::RunResult;
use bf_protocol::stage_models::StageSpec;
use common::*;
use std::sync::Arc;
use std::time::Duration;

fn stage(name: &str) -> StageSpec {
    StageSpec::new(name, ["true"])
}

fn table() -> Vec<StageSpec> {
    vec![
        stage("svn/ruby").gating(),
        stage("configure").gating(),
        stage("miniruby"),
        stage("btest").with_classifier(r"^FAIL (\d+)/", "{1}BFail"),
        stage("test-knownbug").advisory(),
        stage("test-all"),
    ]
}

#[tokio::test]
async fn test_all_stages_succeed() {
    let scripted = Arc::new(ScriptedStages::new());
    let engine = PipelineEngine::new(scripted.clone());

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;

    assert_finalized(&run);
    assert_eq!(run.result, RunResult::Success);
    assert_title_has(&run, "success");
    assert_eq!(
        stage_names(&run),
        vec!["svn/ruby", "configure", "miniruby", "btest", "test-knownbug", "test-all", "end"]
    );
    assert_eq!(
        scripted.calls(),
        vec!["svn/ruby", "configure", "miniruby", "btest", "test-knownbug", "test-all"]
    );
}

#[tokio::test]
async fn test_gating_failure_skips_the_rest() {
    let scripted = Arc::new(ScriptedStages::new().with_outcome("svn/ruby", StageOutcome::Failed));
    let engine = PipelineEngine::new(scripted.clone());

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;

    assert_finalized(&run);
    assert_eq!(stage_names(&run), vec!["svn/ruby", "end"]);
    assert_eq!(scripted.calls(), vec!["svn/ruby"]);
    assert_eq!(run.result, RunResult::Failure);
    assert_title_has(&run, "failed(svn/ruby)");
    assert_title_lacks(&run, "success");
}

#[tokio::test]
async fn test_gating_timeout_also_closes_the_gate() {
    let scripted = Arc::new(ScriptedStages::new().with_outcome("configure", StageOutcome::TimedOut));
    let engine = PipelineEngine::new(scripted);

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;

    assert_eq!(stage_names(&run), vec!["svn/ruby", "configure", "end"]);
    assert_title_has(&run, "timeout(configure)");
}

#[tokio::test]
async fn test_non_gating_failure_continues() {
    let scripted = Arc::new(
        ScriptedStages::new()
            .with_outcome("btest", StageOutcome::FailedWithDetail("3BFail".to_string())),
    );
    let engine = PipelineEngine::new(scripted);

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;

    assert_eq!(run.stages.len(), table().len() + 1);
    assert_eq!(run.result, RunResult::Failure);
    assert_title_has(&run, "3BFail");
    assert_eq!(
        run.record.get("stage.btest").map(String::as_str),
        Some("3BFail")
    );
}

#[tokio::test]
async fn test_advisory_failure_is_recorded_but_not_counted() {
    let scripted =
        Arc::new(ScriptedStages::new().with_outcome("test-knownbug", StageOutcome::Failed));
    let engine = PipelineEngine::new(scripted);

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;

    assert_eq!(run.result, RunResult::Success);
    assert_title_has(&run, "success");
    assert_title_lacks(&run, "failed(test-knownbug)");
    assert_eq!(
        run.record.get("stage.test-knownbug").map(String::as_str),
        Some("failed(test-knownbug)")
    );
}

#[tokio::test]
async fn test_recorded_count_matches_first_gating_failure() {
    // Exhaustive over which (if any) of the gating stages fails.
    let stages = table();
    let gating: Vec<usize> = stages
        .iter()
        .enumerate()
        .filter(|(_, s)| s.gating)
        .map(|(i, _)| i)
        .collect();

    let mut cases: Vec<Option<usize>> = gating.iter().copied().map(Some).collect();
    cases.push(None);

    for failing in cases {
        let mut scripted = ScriptedStages::new();
        if let Some(index) = failing {
            scripted = scripted.with_outcome(&stages[index].name, StageOutcome::Failed);
        }
        let engine = PipelineEngine::new(Arc::new(scripted));
        let run = engine.run(&stages, create_run("trunk", "agent1")).await;

        let expected = failing.map_or(stages.len(), |index| index + 1);
        assert_eq!(run.stages.len(), expected + 1, "failing gate: {failing:?}");
    }
}

#[tokio::test]
async fn test_overall_result_over_all_outcome_combinations() {
    let outcomes = [
        StageOutcome::Success,
        StageOutcome::Failed,
        StageOutcome::FailedWithDetail("1F0E".to_string()),
        StageOutcome::TimedOut,
    ];
    let stages = vec![stage("a"), stage("b"), stage("c").advisory()];

    for a in &outcomes {
        for b in &outcomes {
            for c in &outcomes {
                let scripted = ScriptedStages::new()
                    .with_outcome("a", a.clone())
                    .with_outcome("b", b.clone())
                    .with_outcome("c", c.clone());
                let engine = PipelineEngine::new(Arc::new(scripted));
                let run = engine.run(&stages, create_run("trunk", "agent1")).await;

                let counted_failure =
                    *a != StageOutcome::Success || *b != StageOutcome::Success;
                let expected = if counted_failure {
                    RunResult::Failure
                } else {
                    RunResult::Success
                };
                assert_eq!(run.result, expected, "outcomes: {a:?} {b:?} {c:?}");
                assert_eq!(
                    run.title.last().map(String::as_str) == Some("success"),
                    expected == RunResult::Success
                );
            }
        }
    }
}

#[tokio::test]
async fn test_captures_feed_the_title() {
    let scripted = Arc::new(
        ScriptedStages::new()
            .with_output("svn-info/ruby", StageOutcome::Success, "Path: .\nRevision: 54321\n")
            .with_output(
                "version",
                StageOutcome::Success,
                "ruby 3.4.0dev (2026-10-18 trunk 54321) [x86_64-linux]\n",
            )
            .with_output("main", StageOutcome::Success, "x.c:1: warning: unused\n"),
    );
    let stages = vec![
        stage("svn-info/ruby").gating().with_capture("revision", r"^Revision: (\d+)"),
        stage("main"),
        stage("version").with_capture("version", r"([^\r\n]+)[\r\n]*\z"),
    ];
    let engine = PipelineEngine::new(scripted);

    let run = engine.run(&stages, create_run("trunk", "agent1")).await;

    assert_eq!(
        run.title,
        vec![
            "r54321",
            "1W",
            "ruby 3.4.0dev (2026-10-18 trunk 54321) [x86_64-linux]",
            "(agent1)",
            "success"
        ]
    );
    assert_eq!(run.record.get("revision").map(String::as_str), Some("54321"));
    assert_eq!(run.record.get("warnings").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_capture_is_ignored_on_failure() {
    let scripted = Arc::new(ScriptedStages::new().with_output(
        "version",
        StageOutcome::Failed,
        "ruby 3.4.0dev\n",
    ));
    let stages = vec![stage("version").with_capture("version", r"([^\r\n]+)[\r\n]*\z")];
    let engine = PipelineEngine::new(scripted);

    let run = engine.run(&stages, create_run("trunk", "agent1")).await;

    assert_eq!(run.record.get("version"), None);
    assert_eq!(run.title[0], "trunk");
}

#[tokio::test]
async fn test_finalized_run_is_not_executed_again() {
    let scripted = Arc::new(ScriptedStages::new());
    let engine = PipelineEngine::new(scripted.clone());

    let run = engine.run(&table(), create_run("trunk", "agent1")).await;
    let stages_before = run.stages.len();
    let run = engine.run(&table(), run).await;

    assert_eq!(run.stages.len(), stages_before);
    assert_eq!(scripted.calls().len(), table().len());
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_stages_classified_failure() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let engine = PipelineEngine::new(Arc::new(runner));

    let stages = vec![
        sh_stage("miniruby", "echo built"),
        sh_stage("btest", "echo 'FAIL 3/456'; exit 1").with_classifier(r"^FAIL (\d+)/", "{1}BFail"),
        sh_stage("test-all", "echo ok"),
    ];

    let run = engine.run(&stages, create_run("trunk", "agent1")).await;

    assert_finalized(&run);
    assert_eq!(run.result, RunResult::Failure);
    assert_title_has(&run, "3BFail");
    assert_eq!(stage_names(&run), vec!["miniruby", "btest", "test-all", "end"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_checkout_failure_skips_everything() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let runner = test_runner(dir.path(), Duration::from_secs(30));
    let engine = PipelineEngine::new(Arc::new(runner));

    let stages = vec![
        sh_stage("svn/ruby", "echo 'svn: E170013: Unable to connect'; exit 1").gating(),
        sh_stage("configure", "echo configured").in_build_dir().gating(),
        sh_stage("main", "echo built").in_build_dir(),
    ];

    let run = engine.run(&stages, create_run("trunk", "agent1")).await;

    assert_eq!(stage_names(&run), vec!["svn/ruby", "end"]);
    assert_eq!(run.result, RunResult::Failure);
    assert_title_has(&run, "failed(svn/ruby)");
}
