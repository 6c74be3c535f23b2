//! Immutable execution context for spawned commands.
//!
//! Environment injections, search-path prefixes and the forced locale are
//! collected here once per run and applied to each command at spawn time.
//! The process-wide environment is never mutated.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use tokio::process::Command;

/// Locale variable forced for every command so tool output is parseable.
pub const LOCALE_VAR: &str = "LANG";

/// Default value of [`LOCALE_VAR`].
pub const DEFAULT_LOCALE: &str = "C";

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    env: BTreeMap<OsString, OsString>,
    locale: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every command.
    pub fn with_env(mut self, name: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Prepend `prefix` to the search-path variable `name`.
    ///
    /// The base value is this context's own value if already set, otherwise
    /// the value inherited from the current process.
    pub fn with_path_prefix(mut self, name: &str, prefix: &str) -> Self {
        let base = self
            .env
            .get(OsStr::new(name))
            .cloned()
            .or_else(|| std::env::var_os(name));

        let mut parts: Vec<PathBuf> = std::env::split_paths(prefix)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if let Some(base) = base.filter(|b| !b.is_empty()) {
            parts.extend(std::env::split_paths(&base));
        }

        // Paths containing the separator cannot be joined; keep the raw
        // concatenation in that case.
        let value = std::env::join_paths(&parts).unwrap_or_else(|_| OsString::from(prefix));
        self.env.insert(OsString::from(name), value);
        self
    }

    /// Override the locale value forced into [`LOCALE_VAR`].
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Value `name` will have in a spawned command.
    pub fn var(&self, name: &str) -> Option<OsString> {
        if name == LOCALE_VAR {
            return Some(OsString::from(&self.locale));
        }
        self.env
            .get(OsStr::new(name))
            .cloned()
            .or_else(|| std::env::var_os(name))
    }

    /// Search path commands are resolved against.
    pub fn search_path(&self) -> Option<OsString> {
        self.var("PATH")
    }

    /// Translate the context into the command's environment block.
    pub(crate) fn apply(&self, command: &mut Command) {
        command.envs(&self.env);
        command.env(LOCALE_VAR, &self.locale);
    }
}
