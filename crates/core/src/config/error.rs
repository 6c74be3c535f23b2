//! Error types for configuration loading.
//!
//! This module defines all errors that can occur while reading a target's
//! settings file and validating it into a [`BuildConfig`](super::models::BuildConfig).

use crate::stage::template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk.
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse YAML file at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A required key is absent and no override supplied it.
    #[error("Missing required key `{key}` in {path}")]
    MissingKey { path: PathBuf, key: &'static str },

    /// A key is present but its value cannot be used.
    #[error("Invalid value for `{key}` in {path}: {reason}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        reason: String,
    },

    /// A classification, capture or revision pattern does not compile.
    #[error("Invalid pattern for stage `{stage}` in {path}: {source}")]
    InvalidPattern {
        path: PathBuf,
        stage: String,
        source: regex::Error,
    },

    /// A stage command references an unknown `{placeholder}`.
    #[error("Invalid command template for stage `{stage}` in {path}: {source}")]
    Template {
        path: PathBuf,
        stage: String,
        source: TemplateError,
    },
}

/// Type alias for Result with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
