//! `buildfarm build <target>`

use super::Options;
use bf_core::builder::Builder;
use bf_core::config::{config_path, load_config};
use bf_protocol::run_models::RunResult;
use color_eyre::eyre::eyre;
use colored::Colorize;
use std::process::ExitCode;
use tracing::error;

/// Run one pipeline for `target` and print where its report went.
///
/// A run whose stages failed still exits successfully: the failure is
/// recorded in the report. Only a run that could not be carried out
/// (unreadable settings, unwritable log directory) exits non-zero.
pub async fn run(options: &Options, target: &str) -> color_eyre::Result<ExitCode> {
    let path = config_path(&options.config_dir, target);
    let config = match load_config(&path, target, options.driver.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!(target_name = %target, error = %e, "cannot load settings");
            return Ok(ExitCode::FAILURE);
        }
    };

    let outcome = match Builder::new(config).run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(target_name = %target, "build aborted: {e:#}");
            return Err(eyre!(e));
        }
    };

    let result = match outcome.run.result {
        RunResult::Success => "success".green().bold(),
        RunResult::Failure => "failure".red().bold(),
        RunResult::Unknown => "unknown".yellow().bold(),
    };
    println!("{} {result} {}", target.bold(), outcome.run.title_line());
    println!("  log: {}", outcome.artifacts.log.display());
    Ok(ExitCode::SUCCESS)
}
