//! Command and stage result models.

use serde::{Deserialize, Serialize};

/// What happened to one external command invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The command ran to completion with this exit code.
    ///
    /// A command terminated by a signal reports `128 + signal`.
    Completed(i32),

    /// The command could not be spawned; the payload is a diagnostic hint.
    FailedToStart(String),

    /// The command exceeded its budget and its process tree was killed.
    TimedOut,
}

/// Three-valued exit status recorded on a [`StageResult`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    /// Non-zero exit. `None` when the process was killed on timeout.
    NonZero(Option<i32>),
    NeverStarted,
}

impl From<&ExitOutcome> for ExitStatus {
    fn from(outcome: &ExitOutcome) -> Self {
        match outcome {
            ExitOutcome::Completed(0) => ExitStatus::Success,
            ExitOutcome::Completed(code) => ExitStatus::NonZero(Some(*code)),
            ExitOutcome::FailedToStart(_) => ExitStatus::NeverStarted,
            ExitOutcome::TimedOut => ExitStatus::NonZero(None),
        }
    }
}

/// Classified outcome of one stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Failed,
    /// Failed, and the classification rule derived this short tag.
    FailedWithDetail(String),
    TimedOut,
}

/// Produced once per executed stage. Immutable after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub name: String,

    /// URL-escaped anchor written into the stage heading.
    pub anchor: String,

    /// Captured transcript: heading, command line, combined stdout/stderr
    /// and trailer lines, in write order.
    pub output: String,

    pub exit_status: ExitStatus,

    pub elapsed_ms: u64,

    pub outcome: StageOutcome,

    pub counts_toward_failure: bool,

    pub gating: bool,
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Success
    }

    /// True when this result flips the run's overall result to failure.
    pub fn is_counted_failure(&self) -> bool {
        self.counts_toward_failure && !self.is_success()
    }

    /// Short tag describing the failure, regardless of whether it counts.
    pub fn failure_tag(&self) -> Option<String> {
        match &self.outcome {
            StageOutcome::Success => None,
            StageOutcome::Failed => Some(format!("failed({})", self.name)),
            StageOutcome::FailedWithDetail(tag) => Some(tag.clone()),
            StageOutcome::TimedOut => Some(format!("timeout({})", self.name)),
        }
    }

    /// Tag contributed to the run title. Advisory stages contribute nothing.
    pub fn title_tag(&self) -> Option<String> {
        if self.counts_toward_failure {
            self.failure_tag()
        } else {
            None
        }
    }

    /// Suffix shown next to the stage in the log's table of contents.
    pub fn toc_suffix(&self) -> Option<&'static str> {
        match self.outcome {
            StageOutcome::Success => None,
            StageOutcome::TimedOut => Some("timeout"),
            StageOutcome::Failed | StageOutcome::FailedWithDetail(_) => Some("failed"),
        }
    }
}
