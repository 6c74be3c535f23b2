//! Test fixtures for creating stage specs, runners and configurations.

use bf_core::config::models::Timeouts;
use bf_core::exec::{ExecutionContext, TimedExecutor};
use bf_core::stage::StageRunner;
use bf_protocol::stage_models::StageSpec;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A stage running `script` through `sh -c` in the run root.
#[allow(dead_code)]
pub fn sh_stage(name: &str, script: &str) -> StageSpec {
    StageSpec::new(name, ["sh", "-c", script])
}

/// Timeouts short enough for tests; every category gets `budget`.
#[allow(dead_code)]
pub fn test_timeouts(budget: Duration) -> Timeouts {
    Timeouts {
        short: budget,
        default: budget,
        long: budget,
        overrides: Default::default(),
    }
}

/// A runner rooted at `root`, whose build directory is `root/ruby`
/// (not created).
#[allow(dead_code)]
pub fn test_runner(root: &Path, budget: Duration) -> StageRunner {
    StageRunner::new(
        TimedExecutor::new(ExecutionContext::new()),
        test_timeouts(budget),
        root,
        root.join("ruby"),
    )
}

/// Write `<dir>/<target>.yaml` with the required keys pointing into `dir`,
/// followed by `extra` YAML.
///
/// Returns the path of the written file.
#[allow(dead_code)]
pub fn write_target_config(dir: &Path, target: &str, extra: &str) -> std::io::Result<PathBuf> {
    let logdir = dir.join("logs");
    let tmpdir = dir.join("tmp");
    let yaml = format!(
        "driver: /usr/bin/ruby\nrepository: file:///srv/svn/ruby/trunk\nlogdir: {}\ntmpdir: {}\n{extra}",
        logdir.display(),
        tmpdir.display()
    );
    let path = dir.join(format!("{target}.yaml"));
    std::fs::write(&path, yaml)?;
    Ok(path)
}
