//! Validated configuration for one build target.
//!
//! [`BuildConfig`] is what the rest of the crate consumes: every default
//! is applied, every pattern is known to compile, and every stage command
//! template only references known variables.

use crate::exec::ExecutionContext;
use crate::stage::template::TemplateVars;
use bf_protocol::config_models::UploadConfig;
use bf_protocol::stage_models::{StageSpec, TimeoutCategory};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_SHORT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_LONG_TIMEOUT: Duration = Duration::from_secs(1800);

pub const DEFAULT_BUILD_DIR: &str = "ruby";
pub const DEFAULT_RECENT_LIMIT: usize = 100;
pub const DEFAULT_REVISION_PATTERN: &str = r"^Revision: (\d+)";

/// Stage timeouts: one default per category plus per-stage overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    pub short: Duration,
    pub default: Duration,
    pub long: Duration,
    pub overrides: BTreeMap<String, Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_TIMEOUT,
            default: DEFAULT_TIMEOUT,
            long: DEFAULT_LONG_TIMEOUT,
            overrides: BTreeMap::new(),
        }
    }
}

impl Timeouts {
    /// Budget for `spec`: its per-stage override, else its category default.
    pub fn for_stage(&self, spec: &StageSpec) -> Duration {
        self.overrides
            .get(&spec.name)
            .copied()
            .unwrap_or_else(|| self.for_category(spec.timeout))
    }

    pub fn for_category(&self, category: TimeoutCategory) -> Duration {
        match category {
            TimeoutCategory::Short => self.short,
            TimeoutCategory::Default => self.default,
            TimeoutCategory::Long => self.long,
        }
    }
}

/// Resolved external tool names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub svn: String,
    pub make: String,
    pub cc: String,
    pub bison: String,
    pub gzip: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            svn: "svn".to_string(),
            make: "make".to_string(),
            cc: "cc".to_string(),
            bison: "bison".to_string(),
            gzip: "gzip".to_string(),
        }
    }
}

/// Fully validated settings for one target.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub target: String,
    pub driver: String,
    pub repository: String,
    pub logdir: PathBuf,
    /// Parent directory of the per-run temporary directory.
    pub tmpdir: PathBuf,
    pub build_dir: String,
    pub timeouts: Timeouts,
    pub context: ExecutionContext,
    pub tools: Tools,
    pub recent_limit: usize,
    pub compress: bool,
    pub revision_command: Vec<String>,
    pub revision_pattern: String,
    pub stages: Vec<StageSpec>,
    pub upload: UploadConfig,
}

impl BuildConfig {
    /// Variables available to stage command templates for a run rooted at
    /// `run_dir`.
    pub fn template_vars(&self, run_dir: &Path) -> TemplateVars {
        let mut vars = TemplateVars::new();
        let builddir = run_dir.join(&self.build_dir);
        let prefix = run_dir.join("install");

        vars.insert("tmpdir".to_string(), run_dir.display().to_string());
        vars.insert("builddir".to_string(), builddir.display().to_string());
        vars.insert("prefix".to_string(), prefix.display().to_string());
        vars.insert("build_dir".to_string(), self.build_dir.clone());
        vars.insert("repository".to_string(), self.repository.clone());
        vars.insert("driver".to_string(), self.driver.clone());
        vars.insert("target".to_string(), self.target.clone());
        vars.insert("svn".to_string(), self.tools.svn.clone());
        vars.insert("make".to_string(), self.tools.make.clone());
        vars.insert("cc".to_string(), self.tools.cc.clone());
        vars.insert("bison".to_string(), self.tools.bison.clone());
        vars.insert("gzip".to_string(), self.tools.gzip.clone());
        vars
    }
}
