//! Configuration loading and management.
//!
//! This module loads one target's `<config-dir>/<target>.yaml`, applies
//! defaults, and validates it into a [`BuildConfig`](models::BuildConfig)
//! before any command runs.

pub mod error;
pub mod loader;
pub mod models;
pub mod stages;

pub use error::{ConfigError, ConfigResult};
pub use loader::{config_path, load_config};
pub use models::{BuildConfig, Timeouts, Tools};
