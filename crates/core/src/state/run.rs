//! Run state machine implementation.
//!
//! This module provides functions for managing the lifecycle of a
//! [`RunState`], from creation through stage recording to finalization.
//! Only the pipeline driving a run calls the mutating functions; once
//! [`finalize_run`] has run the state is never touched again.

use crate::markup::heading_line;
use bf_protocol::result_models::{ExitStatus, StageOutcome, StageResult};
use bf_protocol::run_models::{PipelinePhase, RunResult, RunState};
use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Name of the synthetic stage appended at finalization.
pub const END_STAGE: &str = "end";

/// Headings the run writes around the configured stages.
pub const START_HEADING: &str = "start";
pub const SUCCESS_HEADING: &str = "success";

/// Create a new RunState in the `NotStarted` phase, started now.
///
/// # Arguments
///
/// * `target` - The target name, used as the version fallback in the title
/// * `host` - Short host name of the build agent
pub fn create_run(target: impl Into<String>, host: impl Into<String>) -> RunState {
    create_run_at(target, host, Utc::now())
}

/// Create a new RunState with an explicit start time.
///
/// The preamble holds the target heading, the host nickname, the platform
/// and the `start` heading, in that order.
pub fn create_run_at(
    target: impl Into<String>,
    host: impl Into<String>,
    started_at: DateTime<Utc>,
) -> RunState {
    let target = target.into();
    let host = host.into();
    let local = started_at.with_timezone(&Local);

    let mut preamble = String::new();
    let _ = writeln!(preamble, "{}", heading_line(&target, local));
    let _ = writeln!(preamble, "Nickname: {host}");
    let _ = writeln!(
        preamble,
        "Platform: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    let _ = writeln!(preamble, "{}", heading_line(START_HEADING, local));

    RunState {
        target,
        host,
        started_at,
        completed_at: None,
        phase: PipelinePhase::NotStarted,
        preamble,
        stages: Vec::new(),
        title: Vec::new(),
        result: RunResult::Unknown,
        record: BTreeMap::new(),
    }
}

/// Move the run to the given stage index.
///
/// # Arguments
///
/// * `run` - The run to advance
/// * `stage` - Zero-based index of the stage about to execute
pub fn advance_to(run: &mut RunState, stage: usize) {
    run.phase = PipelinePhase::Running { stage };
}

/// Append a stage result.
///
/// Failure tags of counting stages join the title; every non-success stage
/// lands in the structured record as `stage.<name>`.
pub fn record_stage(run: &mut RunState, result: StageResult) {
    if let Some(tag) = result.title_tag() {
        run.title.push(tag);
    }
    if let Some(tag) = result.failure_tag() {
        run.record.insert(format!("stage.{}", result.name), tag);
    }
    run.stages.push(result);
}

/// Store a value captured from a stage's output.
pub fn record_capture(run: &mut RunState, key: impl Into<String>, value: impl Into<String>) {
    run.record.insert(key.into(), value.into());
}

/// Enter the skipping phase after a gating failure.
///
/// # Arguments
///
/// * `run` - The run whose gating stage failed
/// * `remaining` - Number of declared stages that will not execute
pub fn skip_remaining(run: &mut RunState, remaining: usize) {
    run.phase = PipelinePhase::Skipping { remaining };
}

/// Number of case-insensitive `warn` occurrences in the whole transcript.
pub fn count_warnings(run: &RunState) -> usize {
    std::iter::once(run.preamble.as_str())
        .chain(run.stages.iter().map(|s| s.output.as_str()))
        .map(|text| text.to_ascii_lowercase().matches("warn").count())
        .sum()
}

/// Finalize the run: append the `end` stage, settle the overall result,
/// and compose the title and the structured record.
///
/// Calling this on a finalized run is a no-op.
pub fn finalize_run(run: &mut RunState) {
    finalize_run_at(run, Utc::now());
}

/// [`finalize_run`] with an explicit completion time.
pub fn finalize_run_at(run: &mut RunState, completed_at: DateTime<Utc>) {
    if run.is_finalized() {
        return;
    }

    let result = if run.stages.iter().any(StageResult::is_counted_failure) {
        RunResult::Failure
    } else {
        RunResult::Success
    };

    let elapsed = (completed_at - run.started_at)
        .to_std()
        .unwrap_or_default();
    let secs = elapsed.as_secs_f64();
    let local = completed_at.with_timezone(&Local);

    let mut output = String::new();
    if result == RunResult::Success {
        let _ = writeln!(output, "{}", heading_line(SUCCESS_HEADING, local));
    }
    let _ = writeln!(output, "{}", heading_line(END_STAGE, local));
    let _ = writeln!(output, "{}", elapsed_line(secs));

    run.stages.push(StageResult {
        name: END_STAGE.to_string(),
        anchor: END_STAGE.to_string(),
        output,
        exit_status: ExitStatus::Success,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        outcome: StageOutcome::Success,
        counts_toward_failure: false,
        gating: false,
    });

    let warnings = count_warnings(run);

    let mut title = Vec::with_capacity(run.title.len() + 5);
    if let Some(revision) = run.record.get("revision") {
        title.push(format!("r{revision}"));
    }
    if warnings > 0 {
        title.push(format!("{warnings}W"));
    }
    title.push(
        run.record
            .get("version")
            .cloned()
            .unwrap_or_else(|| run.target.clone()),
    );
    title.push(format!("({})", run.host));
    title.append(&mut run.title);
    if result == RunResult::Success {
        title.push("success".to_string());
    }

    let stamp = run.stamp();
    let record = &mut run.record;
    record.insert("target".to_string(), run.target.clone());
    record.insert("host".to_string(), run.host.clone());
    record.insert("start_time".to_string(), stamp);
    record.insert("result".to_string(), result.as_str().to_string());
    record.insert("warnings".to_string(), warnings.to_string());
    record.insert("elapsed".to_string(), format!("{secs:.1}"));

    run.title = title;
    run.result = result;
    run.completed_at = Some(completed_at);
    run.phase = PipelinePhase::Finalized;
}

fn elapsed_line(secs: f64) -> String {
    let minutes = (secs / 60.0).floor();
    let rest = secs - minutes * 60.0;
    format!("elapsed {secs:.1}s = {minutes:.0}m {rest:.1}s")
}
