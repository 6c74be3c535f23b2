//! `buildfarm`: run the build pipeline for a target, once or on a schedule.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "buildfarm")]
#[command(version, about = "Unattended build-and-test pipeline", long_about = None)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding `<target>.yaml` settings files
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Driver runtime path, used when the settings file has none
    #[arg(long, global = true)]
    driver: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline for one target and write its report
    Build {
        /// Target name; settings are read from `<config-dir>/<target>.yaml`
        target: String,
    },

    /// Poll upstream and build each target whenever it changed
    Kick {
        /// Seconds to sleep between passes
        #[arg(short, long, default_value_t = 30)]
        interval: u64,

        /// Seconds after which a target is rebuilt even if unchanged
        #[arg(short, long, default_value_t = 86_400)]
        force_after: u64,

        /// Make a single pass over the targets, then exit
        #[arg(long)]
        once: bool,

        #[arg(required = true)]
        targets: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = commands::Options {
        config_dir: cli.config_dir,
        driver: cli.driver,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Build { target } => commands::build::run(&options, &target).await,
        Commands::Kick {
            interval,
            force_after,
            once,
            targets,
        } => {
            let schedule = commands::kick::Schedule {
                interval: std::time::Duration::from_secs(interval),
                force_after: std::time::Duration::from_secs(force_after),
                once,
            };
            commands::kick::run(&options, &schedule, &targets).await
        }
    }
}
