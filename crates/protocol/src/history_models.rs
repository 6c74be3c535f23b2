//! History record models.
//!
//! One [`HistoryEntry`] per run appears in both the capped `recent` list and
//! the unbounded `summary` list.

use crate::run_models::{RunResult, RUN_STAMP_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Run stamp, e.g. `20261018T074512Z` or `20261018T074512Z-2` for a
    /// second run in the same second. Doubles as the entry's anchor.
    pub start_time: String,

    /// Unescaped run title.
    pub title: String,

    /// Log artifact path relative to the log directory.
    pub log_ref: String,

    /// Diff artifact path relative to the log directory, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_ref: Option<String>,
}

impl HistoryEntry {
    /// A title ends with `success` exactly when the run succeeded.
    pub fn result(&self) -> RunResult {
        match self.title.split_whitespace().last() {
            Some("success") => RunResult::Success,
            Some(_) => RunResult::Failure,
            None => RunResult::Unknown,
        }
    }

    /// Revision recorded in the leading `r<rev>` title token.
    pub fn revision(&self) -> Option<&str> {
        let first = self.title.split_whitespace().next()?;
        let rev = first.strip_prefix('r')?;
        if !rev.is_empty() && rev.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(rev)
        } else {
            None
        }
    }

    /// Start time encoded in the stamp. A `-N` suffix, added when two runs
    /// start in the same second, is ignored.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let stamp = self
            .start_time
            .split_once('-')
            .map_or(self.start_time.as_str(), |(stamp, _)| stamp);
        NaiveDateTime::parse_from_str(stamp, RUN_STAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}
