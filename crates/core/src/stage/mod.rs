//! Stage execution.
//!
//! This module provides:
//! - [`StageRunner`]: runs one [`StageSpec`](bf_protocol::StageSpec) and classifies its outcome
//! - [`classify`]: compiled classification and capture rules
//! - [`template`]: `{name}` expansion for command templates

pub mod classify;
pub mod runner;
pub mod template;

pub use runner::StageRunner;

use async_trait::async_trait;
use bf_protocol::result_models::StageResult;
use bf_protocol::stage_models::StageSpec;

/// Executes one stage to completion.
///
/// [`StageRunner`] is the production implementation; the pipeline only
/// depends on this trait.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn run_stage(&self, spec: &StageSpec) -> StageResult;
}

#[async_trait]
impl StageExecutor for StageRunner {
    async fn run_stage(&self, spec: &StageSpec) -> StageResult {
        StageRunner::run_stage(self, spec).await
    }
}
