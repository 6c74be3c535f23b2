//! Stage descriptor models.
//!
//! A pipeline is a table of [`StageSpec`] values interpreted by one generic
//! stage runner. Each stage is one external command, one timeout and at most
//! one classification rule.

use serde::{Deserialize, Serialize};

/// Working directory a stage command runs in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkDir {
    /// The per-run temporary directory.
    #[default]
    Root,

    /// The checked-out build directory inside the per-run temporary directory.
    ///
    /// If it does not exist when the stage starts, the stage never starts.
    Build,
}

/// Named timeout category used when no per-stage override is configured.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutCategory {
    Short,
    #[default]
    Default,
    Long,
}

/// Turns a failed stage's output into a short failure tag.
///
/// `pattern` is matched line-wise (`^` and `$` anchor at line boundaries).
/// `tag` is a template where `{N}` is replaced by capture group `N`, so
/// `^FAIL (\d+)/` with `{1}BFail` turns `FAIL 3/456` into `3BFail`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub pattern: String,
    pub tag: String,
}

/// Extracts a value from a successful stage's output into the run record.
///
/// The first capture group of `pattern` is stored under `key`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureRule {
    pub key: String,
    pub pattern: String,
}

/// Immutable descriptor of one pipeline stage.
///
/// # Example
///
/// ```yaml
/// name: btest
/// command: ["{make}", "OPTS=-v -q", "btest"]
/// workdir: build
/// classify:
///   pattern: '^FAIL (\d+)/'
///   tag: '{1}BFail'
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Unique stage name; also the key for per-stage timeout overrides.
    pub name: String,

    /// Command template as an argv vector. `{var}` placeholders are
    /// expanded before the command is spawned.
    pub command: Vec<String>,

    #[serde(default)]
    pub workdir: WorkDir,

    #[serde(default)]
    pub timeout: TimeoutCategory,

    /// A failing gating stage skips every remaining stage.
    #[serde(default)]
    pub gating: bool,

    /// Advisory stages set this to false: their failures are recorded but
    /// never flip the run's overall result.
    #[serde(default = "default_counts")]
    pub counts_toward_failure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify: Option<ClassificationRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureRule>,
}

fn default_counts() -> bool {
    true
}

impl StageSpec {
    /// Create a counting, non-gating stage that runs in the root directory
    /// with the default timeout category.
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            workdir: WorkDir::Root,
            timeout: TimeoutCategory::Default,
            gating: false,
            counts_toward_failure: true,
            classify: None,
            capture: None,
        }
    }

    /// Run the stage inside the checked-out build directory.
    pub fn in_build_dir(mut self) -> Self {
        self.workdir = WorkDir::Build;
        self
    }

    /// Set the timeout category.
    pub fn with_timeout(mut self, category: TimeoutCategory) -> Self {
        self.timeout = category;
        self
    }

    /// Mark the stage as gating.
    pub fn gating(mut self) -> Self {
        self.gating = true;
        self
    }

    /// Mark the stage as advisory (does not count toward run failure).
    pub fn advisory(mut self) -> Self {
        self.counts_toward_failure = false;
        self
    }

    /// Attach an output classification rule.
    pub fn with_classifier(mut self, pattern: impl Into<String>, tag: impl Into<String>) -> Self {
        self.classify = Some(ClassificationRule {
            pattern: pattern.into(),
            tag: tag.into(),
        });
        self
    }

    /// Attach a capture rule.
    pub fn with_capture(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.capture = Some(CaptureRule {
            key: key.into(),
            pattern: pattern.into(),
        });
        self
    }
}
