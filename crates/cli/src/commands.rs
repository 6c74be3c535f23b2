pub mod build;
pub mod kick;

use std::path::PathBuf;

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Options {
    pub config_dir: PathBuf,
    pub driver: Option<String>,
    pub verbose: bool,
}
