//! `buildfarm kick <target>...`: the polling loop.
//!
//! Each pass visits every target in order, decides whether it needs a
//! build, and if so runs `buildfarm build <target>` as a child process so
//! a crashing build never takes the loop down with it.

use super::Options;
use bf_core::config::models::BuildConfig;
use bf_core::config::{config_path, load_config};
use bf_core::exec::TimedExecutor;
use bf_core::revision::{current_revision, last_recorded, should_build, BuildDecision};
use chrono::Utc;
use color_eyre::eyre::WrapErr;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    pub force_after: Duration,
    pub once: bool,
}

pub async fn run(
    options: &Options,
    schedule: &Schedule,
    targets: &[String],
) -> color_eyre::Result<ExitCode> {
    let program = std::env::current_exe().wrap_err("Failed to locate the buildfarm executable")?;

    loop {
        for target in targets {
            let span = info_span!("kick", target_name = %target);
            visit(options, schedule, &program, target)
                .instrument(span)
                .await;
        }

        if schedule.once {
            return Ok(ExitCode::SUCCESS);
        }
        debug!(interval = ?schedule.interval, "sleeping");
        tokio::time::sleep(schedule.interval).await;
    }
}

async fn visit(options: &Options, schedule: &Schedule, program: &Path, target: &str) {
    let path = config_path(&options.config_dir, target);
    let config = match load_config(&path, target, options.driver.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "skipping target");
            return;
        }
    };

    if let BuildDecision::Build(reason) = decide(&config, schedule.force_after).await {
        info!(?reason, "starting build");
        spawn_build(options, program, target).await;
    } else {
        debug!("up to date");
    }
}

async fn decide(config: &BuildConfig, force_after: Duration) -> BuildDecision {
    let last = last_recorded(&config.logdir).unwrap_or_else(|e| {
        warn!(error = %e, "cannot read build history");
        None
    });
    let current = current_revision(config, &TimedExecutor::new(config.context.clone()))
        .await
        .unwrap_or_else(|e| {
            warn!("cannot query upstream revision: {e:#}");
            None
        });
    should_build(last.as_ref(), current.as_deref(), Utc::now(), force_after)
}

async fn spawn_build(options: &Options, program: &Path, target: &str) {
    let mut command = Command::new(program);
    command.arg("--config-dir").arg(&options.config_dir);
    if let Some(driver) = &options.driver {
        command.arg("--driver").arg(driver);
    }
    if options.verbose {
        command.arg("--verbose");
    }
    command.arg("build").arg(target);

    match command.status().await {
        Ok(status) if status.success() => info!("build finished"),
        Ok(status) => warn!(%status, "build exited abnormally"),
        Err(e) => warn!(error = %e, "failed to start build"),
    }
}
