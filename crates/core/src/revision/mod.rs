//! Upstream revision query and the "should I build" decision.

use crate::config::models::BuildConfig;
use crate::exec::TimedExecutor;
use crate::stage::classify::compile;
use crate::stage::template::expand_argv;
use anyhow::{Context, Result};
use bf_protocol::history_models::HistoryEntry;
use bf_protocol::result_models::ExitOutcome;
use chrono::{DateTime, Utc};
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;
use tracing::{debug, warn};

pub use crate::report::history::last_recorded;

/// Why a build was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildReason {
    /// Nothing usable was recorded before.
    NoHistory,
    /// The last run is older than the forced-rebuild interval.
    Stale,
    /// Upstream moved past the recorded revision.
    NewRevision,
    /// The upstream revision could not be determined.
    UnknownRevision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    Build(BuildReason),
    Skip,
}

/// Query the upstream revision with the configured command and pattern.
///
/// `Ok(None)` means the command ran but the revision could not be
/// determined (non-zero exit, failed to start, timed out or no match).
pub async fn current_revision(config: &BuildConfig, executor: &TimedExecutor) -> Result<Option<String>> {
    let vars = config.template_vars(&config.tmpdir);
    let argv = expand_argv(&config.revision_command, &vars)
        .context("Failed to expand revision command")?;
    let pattern = compile(&config.revision_pattern).context("Invalid revision pattern")?;

    let mut sink = tempfile::tempfile().context("Failed to create revision query buffer")?;
    let outcome = executor
        .run(&argv, &sink, config.timeouts.short, None)
        .await;
    if outcome != ExitOutcome::Completed(0) {
        warn!(target_name = %config.target, ?outcome, "revision query failed");
        return Ok(None);
    }

    let mut bytes = Vec::new();
    sink.seek(SeekFrom::Start(0))
        .and_then(|_| sink.read_to_end(&mut bytes))
        .context("Failed to read revision query output")?;
    let output = String::from_utf8_lossy(&bytes);

    let revision = pattern
        .captures(&output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|rev| !rev.is_empty());
    debug!(target_name = %config.target, ?revision, "upstream revision");
    Ok(revision)
}

/// Decide whether to build.
///
/// Builds when nothing was recorded, when the last run is at least
/// `force_after` old, or when the revisions differ. An unknown current
/// revision never suppresses a build.
pub fn should_build(
    last: Option<&HistoryEntry>,
    current: Option<&str>,
    now: DateTime<Utc>,
    force_after: Duration,
) -> BuildDecision {
    let Some((last, started_at)) = last.and_then(|e| e.started_at().map(|t| (e, t))) else {
        return BuildDecision::Build(BuildReason::NoHistory);
    };

    let age = (now - started_at).to_std().unwrap_or_default();
    if age >= force_after {
        return BuildDecision::Build(BuildReason::Stale);
    }

    match current {
        None => BuildDecision::Build(BuildReason::UnknownRevision),
        Some(current) if last.revision() != Some(current) => {
            BuildDecision::Build(BuildReason::NewRevision)
        }
        Some(_) => BuildDecision::Skip,
    }
}
