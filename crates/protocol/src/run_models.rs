//! Run-level state models.
//!
//! A [`RunState`] is created at run start, mutated only by the pipeline
//! driving the run, and handed to the report assembler once finalized.

use crate::result_models::StageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp format used for run identifiers and log file names.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Overall result of one pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Success,
    Failure,
    /// The run has not been finalized yet.
    Unknown,
}

impl RunResult {
    pub fn as_str(self) -> &'static str {
        match self {
            RunResult::Success => "success",
            RunResult::Failure => "failure",
            RunResult::Unknown => "unknown",
        }
    }
}

/// Pipeline state machine.
///
/// `NotStarted -> Running(i) -> {Running(i+1) | Skipping} -> Finalized`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    NotStarted,
    Running { stage: usize },
    /// A gating stage failed; `remaining` stages were not executed.
    Skipping { remaining: usize },
    Finalized,
}

/// State of one pipeline invocation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunState {
    /// Target name, e.g. `gcc-x64-trunk`.
    pub target: String,

    /// Short host name of the build agent.
    pub host: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub phase: PipelinePhase,

    /// Transcript written before the first stage (target and start headings).
    pub preamble: String,

    /// Stage results in pipeline declaration order.
    pub stages: Vec<StageResult>,

    /// Ordered human-readable summary tokens.
    pub title: Vec<String>,

    pub result: RunResult,

    /// Machine-readable key/value record for the history line file.
    pub record: BTreeMap<String, String>,
}

impl RunState {
    /// Start stamp, e.g. `20261018T074512Z`.
    pub fn stamp(&self) -> String {
        self.started_at.format(RUN_STAMP_FORMAT).to_string()
    }

    pub fn title_line(&self) -> String {
        self.title.join(" ")
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn is_finalized(&self) -> bool {
        self.phase == PipelinePhase::Finalized
    }
}
