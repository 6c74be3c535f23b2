//! Scripted stage executor for deterministic pipeline testing.

use async_trait::async_trait;
use bf_core::markup::anchor_for;
use bf_core::stage::StageExecutor;
use bf_protocol::result_models::{ExitStatus, StageOutcome, StageResult};
use bf_protocol::stage_models::StageSpec;
use std::collections::HashMap;
use std::sync::Mutex;

/// Returns a preset outcome per stage name (default `Success`) and records
/// the order in which stages were asked to run.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedStages {
    outcomes: HashMap<String, (StageOutcome, String)>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedStages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` end with `outcome`.
    pub fn with_outcome(self, name: &str, outcome: StageOutcome) -> Self {
        self.with_output(name, outcome, "")
    }

    /// Make `name` end with `outcome` after printing `output`.
    pub fn with_output(mut self, name: &str, outcome: StageOutcome, output: &str) -> Self {
        self.outcomes
            .insert(name.to_string(), (outcome, output.to_string()));
        self
    }

    /// Names of the stages executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StageExecutor for ScriptedStages {
    async fn run_stage(&self, spec: &StageSpec) -> StageResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.name.clone());
        }

        let (outcome, output) = self
            .outcomes
            .get(&spec.name)
            .cloned()
            .unwrap_or((StageOutcome::Success, String::new()));
        let exit_status = match outcome {
            StageOutcome::Success => ExitStatus::Success,
            _ => ExitStatus::NonZero(Some(1)),
        };

        StageResult {
            name: spec.name.clone(),
            anchor: anchor_for(&spec.name),
            output: format!("== {}\n{output}", spec.name),
            exit_status,
            elapsed_ms: 1,
            outcome,
            counts_toward_failure: spec.counts_toward_failure,
            gating: spec.gating,
        }
    }
}
