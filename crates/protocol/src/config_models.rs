//! Raw configuration models for `<config-dir>/<target>.yaml`.
//!
//! Every field is optional here; validation and defaulting happen in the
//! core crate's config loader.

use crate::stage_models::StageSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Represents one target's settings file.
///
/// # Example
///
/// ```yaml
/// # config/gcc-x64-trunk.yaml
/// repository: https://svn.example.org/repos/ruby/trunk
/// logdir: /var/www/ci/trunk
/// timeout:
///   default: 600
///   test-all: 3600
/// env:
///   CC: gcc
/// path_add: /opt/bison/bin
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TargetConfig {
    /// Driver runtime used to bootstrap the build.
    #[serde(default, alias = "baseruby")]
    pub driver: Option<String>,

    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default)]
    pub logdir: Option<PathBuf>,

    /// Parent directory for the per-run temporary directory.
    #[serde(default)]
    pub tmpdir: Option<PathBuf>,

    /// Name of the checkout directory inside the per-run temporary directory.
    #[serde(default)]
    pub build_dir: Option<String>,

    /// Timeouts in seconds, keyed by `default`, `default_short`,
    /// `default_long` or a stage name.
    #[serde(default)]
    pub timeout: BTreeMap<String, f64>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub path_add: Option<String>,

    #[serde(default)]
    pub include_add: Option<String>,

    #[serde(default)]
    pub lib_add: Option<String>,

    #[serde(default)]
    pub locale: Option<String>,

    #[serde(default)]
    pub tools: ToolConfig,

    #[serde(default)]
    pub recent_limit: Option<usize>,

    #[serde(default)]
    pub compress: Option<bool>,

    #[serde(default)]
    pub revision_command: Option<Vec<String>>,

    #[serde(default)]
    pub revision_pattern: Option<String>,

    /// Replaces the built-in stage table when present.
    #[serde(default)]
    pub stages: Option<Vec<StageSpec>>,

    #[serde(default)]
    pub upload: UploadConfig,
}

/// External tool names referenced by the built-in stage table.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ToolConfig {
    #[serde(default)]
    pub svn: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bison: Option<String>,
    #[serde(default)]
    pub gzip: Option<String>,
}

/// Upload hooks to register after a run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UploadConfig {
    /// Copy published artifacts into this directory.
    #[serde(default)]
    pub mirror: Option<PathBuf>,

    /// Run this command with the artifact paths appended.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}
