//! Custom assertion helpers for finalized runs.

use bf_protocol::run_models::{PipelinePhase, RunState};

/// Names of the recorded stages, in order.
#[allow(dead_code)]
pub fn stage_names(run: &RunState) -> Vec<&str> {
    run.stages.iter().map(|s| s.name.as_str()).collect()
}

/// Assert that the run is finalized and its last stage is the `end` marker.
#[allow(dead_code)]
pub fn assert_finalized(run: &RunState) {
    assert_eq!(run.phase, PipelinePhase::Finalized, "run is not finalized");
    assert_eq!(
        run.stages.last().map(|s| s.name.as_str()),
        Some("end"),
        "last stage should be the end marker, got: {:?}",
        stage_names(run)
    );
}

/// Assert that the title contains `token` as a whole word.
#[allow(dead_code)]
pub fn assert_title_has(run: &RunState, token: &str) {
    assert!(
        run.title.iter().any(|t| t == token),
        "title {:?} should contain {token:?}",
        run.title
    );
}

/// Assert that the title does not contain `token` as a whole word.
#[allow(dead_code)]
pub fn assert_title_lacks(run: &RunState, token: &str) {
    assert!(
        !run.title.iter().any(|t| t == token),
        "title {:?} should not contain {token:?}",
        run.title
    );
}
