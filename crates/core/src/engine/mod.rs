//! Pipeline execution engine.
//!
//! The PipelineEngine executes the stage table strictly in declared order,
//! records each [`StageResult`](bf_protocol::StageResult) into the run
//! state, stops early when a gating stage fails, and finalizes the run.

use crate::stage::classify::Extractor;
use crate::stage::StageExecutor;
use crate::state::run::{advance_to, finalize_run, record_capture, record_stage, skip_remaining};
use bf_protocol::run_models::RunState;
use bf_protocol::stage_models::StageSpec;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// The main pipeline execution engine.
///
/// PipelineEngine delegates each stage to a [`StageExecutor`] and owns
/// the state transitions of the run it is driving.
pub struct PipelineEngine {
    executor: Arc<dyn StageExecutor>,
}

impl PipelineEngine {
    /// Create a new PipelineEngine.
    ///
    /// # Arguments
    ///
    /// * `executor` - Runs one stage to completion
    pub fn new(executor: Arc<dyn StageExecutor>) -> Self {
        Self { executor }
    }

    /// Execute `stages` against `run` and return the finalized state.
    ///
    /// This is the main entry point for pipeline execution. It:
    /// 1. Runs each stage in order, recording its result
    /// 2. Applies the stage's capture rule to successful output
    /// 3. Skips every remaining stage once a gating stage is not successful
    /// 4. Finalizes the run (end stage, title, overall result)
    ///
    /// Stage names must be unique within `stages`. A run that is already
    /// finalized is returned unchanged without executing anything.
    pub async fn run(&self, stages: &[StageSpec], mut run: RunState) -> RunState {
        if run.is_finalized() {
            warn!(target_name = %run.target, "run already finalized; not executing");
            return run;
        }

        let span = info_span!("run", target_name = %run.target, stamp = %run.stamp());
        async {
            for (index, spec) in stages.iter().enumerate() {
                advance_to(&mut run, index);

                let result = self.executor.run_stage(spec).await;

                if result.is_success() {
                    if let Some(rule) = &spec.capture {
                        match Extractor::new(rule) {
                            Ok(extractor) => {
                                if let Some(value) = extractor.extract(&result.output) {
                                    record_capture(&mut run, extractor.key(), value);
                                }
                            }
                            Err(e) => {
                                warn!(stage = %spec.name, error = %e, "invalid capture pattern");
                            }
                        }
                    }
                }

                let gate_closed = spec.gating && !result.is_success();
                record_stage(&mut run, result);

                if gate_closed {
                    let remaining = stages.len() - index - 1;
                    info!(stage = %spec.name, remaining, "gating stage failed; skipping the rest");
                    skip_remaining(&mut run, remaining);
                    break;
                }
            }

            finalize_run(&mut run);
            info!(
                result = run.result.as_str(),
                title = %run.title_line(),
                "run finalized"
            );
            run
        }
        .instrument(span)
        .await
    }
}
