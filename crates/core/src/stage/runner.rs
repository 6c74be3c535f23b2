//! Generic stage runner.
//!
//! One [`StageRunner`] interprets every [`StageSpec`] in the stage table:
//! it writes the stage heading into a dedicated transcript file, expands
//! the command template, delegates to the [`TimedExecutor`] and classifies
//! the outcome from the exit status and the captured transcript.

use crate::config::models::Timeouts;
use crate::exec::TimedExecutor;
use crate::markup::{anchor_for, heading_line};
use crate::stage::classify::Classifier;
use crate::stage::template::{expand_argv, TemplateVars};
use bf_protocol::result_models::{ExitOutcome, ExitStatus, StageOutcome, StageResult};
use bf_protocol::stage_models::{StageSpec, WorkDir};
use chrono::Local;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Directory (under the run root) holding per-stage transcripts.
const TRANSCRIPT_DIR: &str = "stage-logs";

#[derive(Debug, Clone)]
pub struct StageRunner {
    executor: TimedExecutor,
    timeouts: Timeouts,
    root_dir: PathBuf,
    build_dir: PathBuf,
    vars: TemplateVars,
}

impl StageRunner {
    /// Create a runner for one run rooted at `root_dir`, whose checkout
    /// lives in `build_dir`.
    pub fn new(
        executor: TimedExecutor,
        timeouts: Timeouts,
        root_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            timeouts,
            root_dir: root_dir.into(),
            build_dir: build_dir.into(),
            vars: TemplateVars::new(),
        }
    }

    /// Set the variables available to command templates.
    pub fn with_vars(mut self, vars: TemplateVars) -> Self {
        self.vars = vars;
        self
    }

    pub fn executor(&self) -> &TimedExecutor {
        &self.executor
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Run one stage. Never fails: every stage-local error becomes part of
    /// the returned [`StageResult`].
    pub async fn run_stage(&self, spec: &StageSpec) -> StageResult {
        let span = info_span!("stage", name = %spec.name);
        async {
            let started = Instant::now();
            let (exit_status, outcome, output) = match self.execute(spec).await {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "stage transcript unavailable");
                    let output = format!(
                        "{}\ntranscript error: {e}\nfailed({})\n",
                        heading_line(&spec.name, Local::now()),
                        spec.name
                    );
                    (ExitStatus::NeverStarted, StageOutcome::Failed, output)
                }
            };

            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(?outcome, elapsed_ms, "stage finished");

            StageResult {
                name: spec.name.clone(),
                anchor: anchor_for(&spec.name),
                output,
                exit_status,
                elapsed_ms,
                outcome,
                counts_toward_failure: spec.counts_toward_failure,
                gating: spec.gating,
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, spec: &StageSpec) -> io::Result<(ExitStatus, StageOutcome, String)> {
        let argv = expand_argv(&spec.command, &self.vars);
        let mut preamble = String::new();
        let _ = writeln!(preamble, "{}", heading_line(&spec.name, Local::now()));
        if let Ok(argv) = &argv {
            let _ = writeln!(preamble, "+ {}", argv.join(" "));
        }
        let path = self.transcript_path(spec);
        let sink = blocking(move || open_transcript(&path, &preamble)).await?;

        let (exit, timeout_secs) = match argv {
            Ok(argv) => {
                let timeout = self.timeouts.for_stage(spec);
                let exit = self
                    .executor
                    .run(&argv, &sink, timeout, Some(self.workdir(spec)))
                    .await;
                (exit, timeout.as_secs_f64())
            }
            Err(e) => (ExitOutcome::FailedToStart(e.to_string()), 0.0),
        };

        if let ExitOutcome::FailedToStart(reason) = &exit {
            warn!(%reason, "stage failed to start");
        }

        let name = spec.name.clone();
        let finished = exit.clone();
        let output = blocking(move || {
            let mut sink = sink;
            write_trailer(&mut sink, &name, &finished, timeout_secs)?;
            read_transcript(&mut sink)
        })
        .await?;
        let outcome = classify(spec, &exit, &output);
        Ok((ExitStatus::from(&exit), outcome, output))
    }

    fn workdir(&self, spec: &StageSpec) -> &Path {
        match spec.workdir {
            WorkDir::Root => &self.root_dir,
            WorkDir::Build => &self.build_dir,
        }
    }

    fn transcript_path(&self, spec: &StageSpec) -> PathBuf {
        self.root_dir
            .join(TRANSCRIPT_DIR)
            .join(format!("{}.log", anchor_for(&spec.name)))
    }
}

/// Run transcript file I/O on the blocking pool.
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

fn open_transcript(path: &Path, preamble: &str) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut sink = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(path)?;
    sink.write_all(preamble.as_bytes())?;
    sink.flush()?;
    Ok(sink)
}

fn write_trailer(
    sink: &mut File,
    name: &str,
    exit: &ExitOutcome,
    timeout_secs: f64,
) -> io::Result<()> {
    // The child shared this file description, so these lines land after
    // everything it wrote.
    match exit {
        ExitOutcome::Completed(0) => {}
        ExitOutcome::Completed(code) => {
            writeln!(sink, "exit {code}")?;
            writeln!(sink, "failed({name})")?;
        }
        ExitOutcome::FailedToStart(reason) => {
            writeln!(sink, "{reason}")?;
            writeln!(sink, "failed({name})")?;
        }
        ExitOutcome::TimedOut => {
            writeln!(
                sink,
                "|execution time exceeds {timeout_secs:.1} seconds. (CommandTimeout)"
            )?;
            writeln!(sink, "failed({name} CommandTimeout)")?;
        }
    }
    sink.flush()
}

fn read_transcript(sink: &mut File) -> io::Result<String> {
    let mut bytes = Vec::new();
    sink.seek(SeekFrom::Start(0))?;
    sink.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Derive the stage outcome from the exit and the captured transcript.
pub fn classify(spec: &StageSpec, exit: &ExitOutcome, output: &str) -> StageOutcome {
    match exit {
        ExitOutcome::Completed(0) => StageOutcome::Success,
        ExitOutcome::TimedOut => StageOutcome::TimedOut,
        ExitOutcome::Completed(_) | ExitOutcome::FailedToStart(_) => {
            let Some(rule) = &spec.classify else {
                return StageOutcome::Failed;
            };
            match Classifier::new(rule) {
                Ok(classifier) => classifier
                    .classify(output)
                    .map_or(StageOutcome::Failed, StageOutcome::FailedWithDetail),
                Err(e) => {
                    warn!(stage = %spec.name, error = %e, "invalid classification pattern");
                    StageOutcome::Failed
                }
            }
        }
    }
}
