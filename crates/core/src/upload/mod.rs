//! Post-run upload hooks.
//!
//! Hooks publish a run's [`ReportArtifacts`] somewhere else. They are
//! fully isolated from the run: every error is logged and swallowed, and
//! nothing a hook does can change the recorded result.

use crate::exec::TimedExecutor;
use crate::report::{ReportArtifacts, LOG_SUBDIR};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bf_protocol::result_models::ExitOutcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Publishes report artifacts after a run.
#[async_trait]
pub trait UploadHook: Send + Sync {
    /// Name used in log messages.
    fn name(&self) -> &str;

    async fn upload(&self, artifacts: &ReportArtifacts) -> Result<()>;
}

/// Registry of hooks. The most recently registered hook runs first.
#[derive(Default, Clone)]
pub struct UploadHooks {
    hooks: Vec<Arc<dyn UploadHook>>,
}

impl UploadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn UploadHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in reverse registration order. Returns the number of
    /// hooks that failed; failures are logged, never propagated.
    ///
    /// Each hook runs in its own task, so a panicking hook counts as a
    /// failure instead of unwinding into the caller.
    pub async fn run_all(&self, artifacts: &ReportArtifacts) -> usize {
        let mut failures = 0;
        for hook in self.hooks.iter().rev() {
            let task = {
                let hook = Arc::clone(hook);
                let artifacts = artifacts.clone();
                tokio::spawn(async move { hook.upload(&artifacts).await })
            };
            match task.await {
                Ok(Ok(())) => info!(hook = hook.name(), "upload finished"),
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(hook = hook.name(), "upload failed: {e:#}");
                }
                Err(e) => {
                    failures += 1;
                    warn!(hook = hook.name(), error = %e, "upload hook panicked");
                }
            }
        }
        failures
    }
}

/// Copies the history documents, and every per-run artifact not yet
/// present, into a destination directory.
#[derive(Debug, Clone)]
pub struct MirrorHook {
    destination: PathBuf,
}

impl MirrorHook {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl UploadHook for MirrorHook {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn upload(&self, artifacts: &ReportArtifacts) -> Result<()> {
        let destination = self.destination.clone();
        let logdir = artifacts.logdir.clone();
        let documents = [
            artifacts.recent.clone(),
            artifacts.summary.clone(),
            artifacts.ltsv.clone(),
        ];

        tokio::task::spawn_blocking(move || mirror(&logdir, &destination, &documents))
            .await
            .context("mirror task panicked")?
    }
}

fn mirror(logdir: &Path, destination: &Path, documents: &[PathBuf]) -> Result<()> {
    let log_dest = destination.join(LOG_SUBDIR);
    std::fs::create_dir_all(&log_dest)
        .with_context(|| format!("Failed to create {}", log_dest.display()))?;

    let log_src = logdir.join(LOG_SUBDIR);
    let mut copied = 0usize;
    for entry in WalkDir::new(&log_src).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", log_src.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let target = log_dest.join(entry.file_name());
        if target.exists() {
            continue;
        }
        std::fs::copy(entry.path(), &target)
            .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        copied += 1;
    }

    for document in documents {
        let Some(name) = document.file_name() else {
            continue;
        };
        std::fs::copy(document, destination.join(name))
            .with_context(|| format!("Failed to copy {}", document.display()))?;
    }

    debug!(copied, destination = %destination.display(), "mirrored artifacts");
    Ok(())
}

/// Runs a configured command with every artifact path appended.
#[derive(Debug, Clone)]
pub struct CommandHook {
    argv: Vec<String>,
    executor: TimedExecutor,
    timeout: Duration,
}

impl CommandHook {
    pub fn new(argv: Vec<String>, executor: TimedExecutor, timeout: Duration) -> Self {
        Self {
            argv,
            executor,
            timeout,
        }
    }
}

#[async_trait]
impl UploadHook for CommandHook {
    fn name(&self) -> &str {
        self.argv.first().map_or("command", String::as_str)
    }

    async fn upload(&self, artifacts: &ReportArtifacts) -> Result<()> {
        let mut argv = self.argv.clone();
        argv.extend(artifacts.paths().iter().map(|p| p.display().to_string()));

        let sink = tempfile::tempfile().context("Failed to create upload output buffer")?;
        match self
            .executor
            .run(&argv, &sink, self.timeout, Some(&artifacts.logdir))
            .await
        {
            ExitOutcome::Completed(0) => Ok(()),
            ExitOutcome::Completed(code) => bail!("upload command exited with {code}"),
            ExitOutcome::FailedToStart(reason) => bail!("upload command did not start: {reason}"),
            ExitOutcome::TimedOut => bail!("upload command timed out after {:?}", self.timeout),
        }
    }
}
