//! Timeout-bounded external command executor.
//!
//! Each command's combined stdout/stderr is written straight into a sink
//! file. The timeout is a fixed wall-clock budget measured from spawn;
//! output does not reset it. When the budget elapses, the child's whole
//! process tree is killed before [`TimedExecutor::run`] returns.

use crate::exec::context::ExecutionContext;
use crate::exec::process_tree;
use bf_protocol::result_models::ExitOutcome;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Upper bound on waiting for a killed child to be reaped.
const REAP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct TimedExecutor {
    context: ExecutionContext,
}

impl TimedExecutor {
    pub fn new(context: ExecutionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Run `argv` with output redirected to `sink`, bounded by `timeout`.
    ///
    /// The calling task blocks until the command completes, fails to start,
    /// or times out.
    pub async fn run(
        &self,
        argv: &[String],
        sink: &File,
        timeout: Duration,
        working_dir: Option<&Path>,
    ) -> ExitOutcome {
        let Some((program, args)) = argv.split_first() else {
            return ExitOutcome::FailedToStart("empty command line".to_string());
        };

        if let Some(dir) = working_dir {
            if !dir.is_dir() {
                return ExitOutcome::FailedToStart(format!(
                    "working directory {} does not exist",
                    dir.display()
                ));
            }
        }

        let (stdout, stderr) = match redirect(sink) {
            Ok(pair) => pair,
            Err(e) => {
                return ExitOutcome::FailedToStart(format!("cannot redirect output: {e}"));
            }
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        self.context.apply(&mut command);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return ExitOutcome::FailedToStart(self.spawn_failure(program, working_dir, &e)),
        };
        let pid = child.id();
        debug!(?pid, %program, ?timeout, "command spawned");

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => ExitOutcome::Completed(exit_code(status)),
            Ok(Err(e)) => {
                error!(%program, error = %e, "failed to wait for command");
                ExitOutcome::Completed(-1)
            }
            Err(_) => {
                warn!(?pid, %program, ?timeout, "command timed out");
                if let Some(root) = pid {
                    // Walking the process table reads /proc; keep it off the workers.
                    let terminated =
                        tokio::task::spawn_blocking(move || process_tree::terminate_tree(root))
                            .await;
                    match terminated {
                        Ok(Ok(count)) => debug!(?pid, count, "terminated timed-out process tree"),
                        Ok(Err(e)) => {
                            error!(?pid, error = %e, "failed to terminate process tree");
                            let _ = child.start_kill();
                        }
                        Err(e) => {
                            error!(?pid, error = %e, "process tree termination task failed");
                            let _ = child.start_kill();
                        }
                    }
                }
                if tokio::time::timeout(REAP_GRACE, child.wait()).await.is_err() {
                    error!(?pid, "killed command was not reaped");
                }
                ExitOutcome::TimedOut
            }
        }
    }

    /// Diagnostic for a failed spawn, distinguishing a missing tool.
    fn spawn_failure(&self, program: &str, working_dir: Option<&Path>, e: &io::Error) -> String {
        if e.kind() != io::ErrorKind::NotFound {
            return format!("failed to spawn `{program}`: {e}");
        }
        let cwd = working_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        match which::which_in(program, self.context.search_path(), cwd) {
            Ok(found) => format!("failed to spawn `{}`: {e}", found.display()),
            Err(_) => format!("tool not found: `{program}` is not on PATH"),
        }
    }
}

fn redirect(sink: &File) -> io::Result<(Stdio, Stdio)> {
    Ok((Stdio::from(sink.try_clone()?), Stdio::from(sink.try_clone()?)))
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn read_back(mut sink: &File) -> String {
        let mut text = String::new();
        sink.seek(SeekFrom::Start(0)).expect("seek");
        sink.read_to_string(&mut text).expect("read");
        text
    }

    #[tokio::test]
    async fn test_run_completed_success() {
        let sink = tempfile::tempfile().expect("tempfile");
        let executor = TimedExecutor::default();

        let outcome = executor
            .run(&argv(&["sh", "-c", "echo hello"]), &sink, Duration::from_secs(10), None)
            .await;

        assert_eq!(outcome, ExitOutcome::Completed(0));
        assert_eq!(read_back(&sink), "hello\n");
    }

    #[tokio::test]
    async fn test_run_captures_stderr_and_exit_code() {
        let sink = tempfile::tempfile().expect("tempfile");
        let executor = TimedExecutor::default();

        let outcome = executor
            .run(
                &argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]),
                &sink,
                Duration::from_secs(10),
                None,
            )
            .await;

        assert_eq!(outcome, ExitOutcome::Completed(3));
        let text = read_back(&sink);
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }

    #[tokio::test]
    async fn test_run_missing_tool_fails_to_start() {
        let sink = tempfile::tempfile().expect("tempfile");
        let executor = TimedExecutor::default();

        let outcome = executor
            .run(&argv(&["nonexistent-command-xyz"]), &sink, Duration::from_secs(10), None)
            .await;

        match outcome {
            ExitOutcome::FailedToStart(reason) => {
                assert!(reason.contains("tool not found"), "unexpected reason: {reason}");
            }
            other => panic!("Expected FailedToStart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_missing_working_dir_fails_to_start() {
        let sink = tempfile::tempfile().expect("tempfile");
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("ruby");
        let executor = TimedExecutor::default();

        let outcome = executor
            .run(&argv(&["true"]), &sink, Duration::from_secs(10), Some(&missing))
            .await;

        assert!(matches!(outcome, ExitOutcome::FailedToStart(_)));
    }

    #[tokio::test]
    async fn test_run_empty_command_fails_to_start() {
        let sink = tempfile::tempfile().expect("tempfile");
        let outcome = TimedExecutor::default()
            .run(&[], &sink, Duration::from_secs(1), None)
            .await;
        assert!(matches!(outcome, ExitOutcome::FailedToStart(_)));
    }

    #[tokio::test]
    async fn test_run_forces_locale() {
        let sink = tempfile::tempfile().expect("tempfile");
        let executor = TimedExecutor::new(ExecutionContext::new().with_env("DUMMY", "foo"));

        let outcome = executor
            .run(
                &argv(&["sh", "-c", "echo \"$LANG $DUMMY\""]),
                &sink,
                Duration::from_secs(10),
                None,
            )
            .await;

        assert_eq!(outcome, ExitOutcome::Completed(0));
        assert_eq!(read_back(&sink), "C foo\n");
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let sink = tempfile::tempfile().expect("tempfile");
        let executor = TimedExecutor::default();

        let started = std::time::Instant::now();
        let outcome = executor
            .run(&argv(&["sleep", "30"]), &sink, Duration::from_millis(100), None)
            .await;

        assert_eq!(outcome, ExitOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
