//! Report assembly.
//!
//! This module provides:
//! - [`html`]: the per-run HTML log and diff placeholder
//! - [`history`]: the capped `recent.html` and unbounded `summary.html`
//! - [`ltsv`]: the machine-readable `recent.ltsv`
//! - [`ReportAssembler`]: turns a finalized [`RunState`] into all of the above
//!
//! Layout under the log directory:
//!
//! ```text
//! logdir/
//! ├── recent.html
//! ├── recent.ltsv
//! ├── summary.html
//! └── log/
//!     ├── 20261018T074512Z.log.html.gz
//!     └── 20261018T074512Z.diff.html.gz
//! ```

pub mod history;
pub mod html;
pub mod ltsv;

use crate::exec::TimedExecutor;
use crate::report::history::{write_atomic, HistoryError, HistoryKind};
use bf_protocol::history_models::HistoryEntry;
use bf_protocol::result_models::ExitOutcome;
use bf_protocol::run_models::RunState;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Subdirectory of the log directory holding per-run artifacts.
pub const LOG_SUBDIR: &str = "log";

/// Budget for compressing one artifact.
const COMPRESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Files produced for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub logdir: PathBuf,
    /// Full HTML log, compressed when compression succeeded.
    pub log: PathBuf,
    pub diff: PathBuf,
    pub recent: PathBuf,
    pub summary: PathBuf,
    pub ltsv: PathBuf,
}

impl ReportArtifacts {
    /// Every artifact, per-run files first.
    pub fn paths(&self) -> [&Path; 5] {
        [
            &self.log,
            &self.diff,
            &self.recent,
            &self.summary,
            &self.ltsv,
        ]
    }

    /// `path` relative to the log directory, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.logdir).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// External compressor invoked as `<program> -f <file>`.
#[derive(Debug, Clone)]
pub struct Compressor {
    executor: TimedExecutor,
    program: String,
}

impl Compressor {
    pub fn new(executor: TimedExecutor, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    /// Compress `path` in place. Returns the artifact to link: the `.gz`
    /// file on success, `path` itself otherwise.
    pub async fn compress(&self, path: &Path) -> PathBuf {
        let compressed = PathBuf::from(format!("{}.gz", path.display()));
        let argv = vec![
            self.program.clone(),
            "-f".to_string(),
            path.display().to_string(),
        ];

        let sink = match tempfile::tempfile() {
            Ok(sink) => sink,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot compress artifact");
                return path.to_path_buf();
            }
        };

        match self.executor.run(&argv, &sink, COMPRESS_TIMEOUT, None).await {
            ExitOutcome::Completed(0) if compressed.is_file() => {
                debug!(path = %compressed.display(), "artifact compressed");
                compressed
            }
            outcome => {
                warn!(
                    path = %path.display(),
                    ?outcome,
                    "compression failed; linking uncompressed artifact"
                );
                path.to_path_buf()
            }
        }
    }
}

/// Writes every report artifact for a finalized run.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    logdir: PathBuf,
    recent_limit: usize,
    compressor: Option<Compressor>,
}

impl ReportAssembler {
    pub fn new(logdir: impl Into<PathBuf>, recent_limit: usize) -> Self {
        Self {
            logdir: logdir.into(),
            recent_limit,
            compressor: None,
        }
    }

    /// Compress the per-run log and diff with `compressor`.
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    /// Write the log and diff, then fold the run into the three history
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if an artifact or history document cannot be
    /// read or written. A failed compression is not an error.
    pub async fn assemble(&self, run: &RunState) -> Result<ReportArtifacts, HistoryError> {
        if !run.is_finalized() {
            warn!(target_name = %run.target, "assembling a report for an unfinalized run");
        }

        let log_dir = self.logdir.join(LOG_SUBDIR);
        tokio::fs::create_dir_all(&log_dir)
            .await
            .map_err(|source| HistoryError::Write {
                path: log_dir.clone(),
                source,
            })?;

        let stamp = claim_stamp(&log_dir, &run.stamp()).await?;
        let log_path = log_dir.join(format!("{stamp}.log.html"));
        let diff_path = log_dir.join(format!("{stamp}.diff.html"));

        write_blocking(log_path.clone(), html::render_log(run)).await?;
        let log = self.finish_artifact(&log_path).await;

        let log_name = log
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_blocking(diff_path.clone(), html::render_diff(run, &log_name)).await?;
        let diff = self.finish_artifact(&diff_path).await;

        let mut artifacts = ReportArtifacts {
            logdir: self.logdir.clone(),
            log,
            diff,
            recent: PathBuf::new(),
            summary: PathBuf::new(),
            ltsv: PathBuf::new(),
        };

        let entry = HistoryEntry {
            start_time: stamp.clone(),
            title: run.title_line(),
            log_ref: artifacts.relative(&artifacts.log),
            diff_ref: Some(artifacts.relative(&artifacts.diff)),
        };

        let mut fields = run.record.clone();
        fields.insert("start_time".to_string(), stamp);
        fields.insert("title".to_string(), entry.title.clone());
        fields.insert("log".to_string(), entry.log_ref.clone());
        if let Some(diff) = &entry.diff_ref {
            fields.insert("diff".to_string(), diff.clone());
        }

        let logdir = self.logdir.clone();
        let target = run.target.clone();
        let limit = self.recent_limit;
        let (recent, summary, ltsv) = tokio::task::spawn_blocking(move || {
            let recent =
                history::record(&logdir, HistoryKind::Recent, &target, entry.clone(), limit)?;
            let summary = history::record(&logdir, HistoryKind::Summary, &target, entry, limit)?;
            let ltsv = ltsv::record(&logdir, &fields, limit)?;
            Ok::<_, HistoryError>((recent, summary, ltsv))
        })
        .await??;
        artifacts.recent = recent;
        artifacts.summary = summary;
        artifacts.ltsv = ltsv;

        Ok(artifacts)
    }

    async fn finish_artifact(&self, path: &Path) -> PathBuf {
        match &self.compressor {
            Some(compressor) => compressor.compress(path).await,
            None => path.to_path_buf(),
        }
    }
}

/// Reserve a per-run stamp in `log_dir`, starting from `stamp`.
///
/// Stamps have one-second resolution, so a run that starts in the same
/// second as an earlier one gets `-2`, `-3`, ... appended. The stamp is
/// claimed by creating its log file, which the log itself then replaces.
async fn claim_stamp(log_dir: &Path, stamp: &str) -> Result<String, HistoryError> {
    for n in 1u32.. {
        let candidate = if n == 1 {
            stamp.to_string()
        } else {
            format!("{stamp}-{n}")
        };
        let log_path = log_dir.join(format!("{candidate}.log.html"));
        let compressed = log_dir.join(format!("{candidate}.log.html.gz"));
        let compressed_taken = tokio::fs::try_exists(&compressed)
            .await
            .map_err(|source| HistoryError::Read {
                path: compressed.clone(),
                source,
            })?;
        if compressed_taken {
            continue;
        }

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&log_path)
            .await
        {
            Ok(_) => {
                if n > 1 {
                    debug!(stamp = %candidate, "run stamp already taken; using suffix");
                }
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(source) => {
                return Err(HistoryError::Write {
                    path: log_path,
                    source,
                })
            }
        }
    }
    Err(HistoryError::Write {
        path: log_dir.join(format!("{stamp}.log.html")),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free run stamp"),
    })
}

/// [`write_atomic`] on the blocking pool.
async fn write_blocking(path: PathBuf, contents: String) -> Result<(), HistoryError> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents)).await?
}
