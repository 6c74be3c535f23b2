//! One complete build: pipeline, report and uploads.

use crate::config::models::BuildConfig;
use crate::engine::PipelineEngine;
use crate::exec::TimedExecutor;
use crate::report::{Compressor, ReportArtifacts, ReportAssembler};
use crate::stage::StageRunner;
use crate::state::run::create_run;
use crate::upload::{CommandHook, MirrorHook, UploadHooks};
use anyhow::{Context, Result};
use bf_protocol::run_models::RunState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`Builder::run`].
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub run: RunState,
    pub artifacts: ReportArtifacts,
}

/// Drives one run of one target.
pub struct Builder {
    config: BuildConfig,
    host: String,
    hooks: UploadHooks,
}

impl Builder {
    /// Create a builder with the upload hooks named in `config`.
    pub fn new(config: BuildConfig) -> Self {
        let mut hooks = UploadHooks::new();
        if let Some(mirror) = &config.upload.mirror {
            hooks.register(Arc::new(MirrorHook::new(mirror)));
        }
        if let Some(argv) = config.upload.command.as_ref().filter(|argv| !argv.is_empty()) {
            hooks.register(Arc::new(CommandHook::new(
                argv.clone(),
                TimedExecutor::new(config.context.clone()),
                config.timeouts.default,
            )));
        }

        Self {
            config,
            host: short_hostname(),
            hooks,
        }
    }

    /// Override the host name recorded in the run.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn hooks_mut(&mut self) -> &mut UploadHooks {
        &mut self.hooks
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Execute the pipeline in a fresh temporary directory, write the
    /// report, then run the upload hooks.
    ///
    /// A failing stage is not an error: it is recorded in the returned run.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created or the
    /// report cannot be written.
    pub async fn run(&self) -> Result<BuildOutcome> {
        let config = &self.config;
        std::fs::create_dir_all(&config.tmpdir)
            .with_context(|| format!("Failed to create {}", config.tmpdir.display()))?;
        let workspace = tempfile::Builder::new()
            .prefix("buildfarm-")
            .tempdir_in(&config.tmpdir)
            .with_context(|| format!("Failed to create run directory in {}", config.tmpdir.display()))?;

        let run_dir = workspace.path();
        let build_dir = run_dir.join(&config.build_dir);
        debug!(run_dir = %run_dir.display(), "run directory created");

        let executor = TimedExecutor::new(config.context.clone());
        let runner = StageRunner::new(
            executor.clone(),
            config.timeouts.clone(),
            run_dir,
            &build_dir,
        )
        .with_vars(config.template_vars(run_dir));
        let engine = PipelineEngine::new(Arc::new(runner));

        info!(target_name = %config.target, host = %self.host, "build started");
        let run = engine
            .run(&config.stages, create_run(&config.target, &self.host))
            .await;

        let mut assembler = ReportAssembler::new(&config.logdir, config.recent_limit);
        if config.compress {
            assembler = assembler.with_compressor(Compressor::new(executor, &config.tools.gzip));
        }
        let artifacts = assembler
            .assemble(&run)
            .await
            .context("Failed to write build report")?;

        let failures = self.hooks.run_all(&artifacts).await;
        if failures > 0 {
            warn!(failures, "some uploads failed");
        }

        if let Err(e) = workspace.close() {
            warn!(error = %e, "failed to remove run directory");
        }

        info!(
            target_name = %config.target,
            result = run.result.as_str(),
            log = %artifacts.log.display(),
            "build finished"
        );
        Ok(BuildOutcome { run, artifacts })
    }
}

/// Short host name (up to the first dot), `localhost` if unavailable.
pub fn short_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => {
            let name = name.to_string_lossy();
            name.split('.').next().unwrap_or_default().to_string()
        }
        Err(e) => {
            warn!(error = %e, "cannot determine host name");
            "localhost".to_string()
        }
    }
}
