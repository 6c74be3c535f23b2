//! Configuration file loader for `<config-dir>/<target>.yaml`.
//!
//! Loading is two steps: parse the YAML document into the raw
//! [`TargetConfig`], then validate it into a [`BuildConfig`]. Every
//! problem a run could only discover halfway through (missing keys,
//! non-positive timeouts, broken patterns, unknown template placeholders)
//! is reported here instead.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::{
    BuildConfig, Timeouts, Tools, DEFAULT_BUILD_DIR, DEFAULT_RECENT_LIMIT,
    DEFAULT_REVISION_PATTERN,
};
use crate::config::stages::default_stages;
use crate::exec::ExecutionContext;
use crate::markup::anchor_for;
use crate::stage::classify::compile;
use crate::stage::template::expand_argv;
use crate::state::run::{END_STAGE, START_HEADING, SUCCESS_HEADING};
use bf_protocol::config_models::TargetConfig;
use bf_protocol::stage_models::StageSpec;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Path of the settings file for `target` inside `config_dir`.
pub fn config_path(config_dir: &Path, target: &str) -> PathBuf {
    config_dir.join(format!("{target}.yaml"))
}

/// Loads and validates one target's configuration.
///
/// # Arguments
///
/// * `path` - The target's settings file
/// * `target` - Target name recorded in every run
/// * `driver` - Overrides the `driver` key when present
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file cannot be read or is not valid YAML
/// - A required key (`driver`, `repository`, `logdir`) is missing
/// - A value is unusable (non-positive timeout, zero `recent_limit`, ...)
/// - A pattern does not compile or a command references an unknown variable
///
/// # Example
///
/// ```rust,no_run
/// use bf_core::config::{config_path, load_config};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let path = config_path(Path::new("config"), "gcc-x64-trunk");
/// let config = load_config(&path, "gcc-x64-trunk", None).await?;
/// println!("{} stages", config.stages.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(
    path: &Path,
    target: &str,
    driver: Option<&str>,
) -> ConfigResult<BuildConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    parse_config(path, &content, target, driver)
}

/// Parses and validates a settings document already in memory.
pub fn parse_config(
    path: &Path,
    content: &str,
    target: &str,
    driver: Option<&str>,
) -> ConfigResult<BuildConfig> {
    let raw: TargetConfig =
        serde_yaml::from_str(content).map_err(|source| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source,
        })?;
    validate(path, raw, target, driver)
}

fn validate(
    path: &Path,
    raw: TargetConfig,
    target: &str,
    driver: Option<&str>,
) -> ConfigResult<BuildConfig> {
    let missing = |key: &'static str| ConfigError::MissingKey {
        path: path.to_path_buf(),
        key,
    };
    let invalid = |key: &str, reason: String| ConfigError::InvalidValue {
        path: path.to_path_buf(),
        key: key.to_string(),
        reason,
    };

    let driver = driver
        .map(str::to_string)
        .or(raw.driver)
        .ok_or_else(|| missing("driver"))?;
    let repository = raw.repository.ok_or_else(|| missing("repository"))?;
    let logdir = raw.logdir.ok_or_else(|| missing("logdir"))?;

    let build_dir = raw
        .build_dir
        .unwrap_or_else(|| DEFAULT_BUILD_DIR.to_string());
    let mut components = Path::new(&build_dir).components();
    let single_name = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_name {
        return Err(invalid(
            "build_dir",
            format!("`{build_dir}` must be a single directory name"),
        ));
    }

    let recent_limit = raw.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if recent_limit == 0 {
        return Err(invalid("recent_limit", "must be at least 1".to_string()));
    }

    let mut timeouts = Timeouts::default();
    for (key, secs) in &raw.timeout {
        let budget = Duration::try_from_secs_f64(*secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                invalid(
                    &format!("timeout.{key}"),
                    format!("{secs} is not a positive number of seconds"),
                )
            })?;
        match key.as_str() {
            "default" => timeouts.default = budget,
            "default_short" => timeouts.short = budget,
            "default_long" => timeouts.long = budget,
            stage => {
                timeouts.overrides.insert(stage.to_string(), budget);
            }
        }
    }

    let mut context = ExecutionContext::new();
    for (name, value) in &raw.env {
        context = context.with_env(name, value);
    }
    for (name, prefix) in [
        ("PATH", &raw.path_add),
        ("INCLUDE", &raw.include_add),
        ("LIB", &raw.lib_add),
    ] {
        if let Some(prefix) = prefix {
            context = context.with_path_prefix(name, prefix);
        }
    }
    if let Some(locale) = raw.locale {
        context = context.with_locale(locale);
    }

    let defaults = Tools::default();
    let tools = Tools {
        svn: raw.tools.svn.unwrap_or(defaults.svn),
        make: raw.tools.make.unwrap_or(defaults.make),
        cc: raw.tools.cc.unwrap_or(defaults.cc),
        bison: raw.tools.bison.unwrap_or(defaults.bison),
        gzip: raw.tools.gzip.unwrap_or(defaults.gzip),
    };

    let revision_pattern = raw
        .revision_pattern
        .unwrap_or_else(|| DEFAULT_REVISION_PATTERN.to_string());
    compile(&revision_pattern).map_err(|source| ConfigError::InvalidPattern {
        path: path.to_path_buf(),
        stage: "revision".to_string(),
        source,
    })?;

    let config = BuildConfig {
        target: target.to_string(),
        driver,
        repository,
        logdir,
        tmpdir: raw.tmpdir.unwrap_or_else(std::env::temp_dir),
        build_dir,
        timeouts,
        context,
        tools,
        recent_limit,
        compress: raw.compress.unwrap_or(true),
        revision_command: raw.revision_command.unwrap_or_else(|| {
            vec![
                "{svn}".to_string(),
                "info".to_string(),
                "{repository}".to_string(),
            ]
        }),
        revision_pattern,
        stages: raw.stages.unwrap_or_else(default_stages),
        upload: raw.upload,
    };

    validate_stages(path, &config)?;
    Ok(config)
}

/// Checks the stage table and the revision command against the template
/// variables a run will provide.
fn validate_stages(path: &Path, config: &BuildConfig) -> ConfigResult<()> {
    let vars = config.template_vars(&config.tmpdir);
    let template_error = |stage: &str, source| ConfigError::Template {
        path: path.to_path_buf(),
        stage: stage.to_string(),
        source,
    };

    expand_argv(&config.revision_command, &vars)
        .map_err(|source| template_error("revision", source))?;

    // Stage names share one anchor namespace with the run's own headings;
    // the anchor also names the stage's transcript file.
    let mut anchors: HashMap<String, &str> = [START_HEADING, SUCCESS_HEADING, END_STAGE]
        .into_iter()
        .map(|heading| (anchor_for(heading), heading))
        .collect();
    for spec in &config.stages {
        check_stage(path, spec)?;
        if let Some(taken) = anchors.insert(anchor_for(&spec.name), &spec.name) {
            return Err(ConfigError::InvalidValue {
                path: path.to_path_buf(),
                key: "stages".to_string(),
                reason: format!("stage `{}` collides with `{taken}`", spec.name),
            });
        }
        expand_argv(&spec.command, &vars).map_err(|source| template_error(&spec.name, source))?;
    }
    Ok(())
}

fn check_stage(path: &Path, spec: &StageSpec) -> ConfigResult<()> {
    if spec.name.is_empty() || spec.command.is_empty() {
        return Err(ConfigError::InvalidValue {
            path: path.to_path_buf(),
            key: "stages".to_string(),
            reason: format!("stage `{}` needs a name and a command", spec.name),
        });
    }

    let patterns = spec
        .classify
        .iter()
        .map(|rule| rule.pattern.as_str())
        .chain(spec.capture.iter().map(|rule| rule.pattern.as_str()));
    for pattern in patterns {
        compile(pattern).map_err(|source| ConfigError::InvalidPattern {
            path: path.to_path_buf(),
            stage: spec.name.clone(),
            source,
        })?;
    }
    Ok(())
}
