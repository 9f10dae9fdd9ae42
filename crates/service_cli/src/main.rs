//! Hydrolocate CLI - Acoustic Source Localisation from Arrival Times
//!
//! This is the operational entry point for the locator_core engine.
//!
//! # Commands
//!
//! - `hydrolocate locate <t1> <t2> ...` - Estimate source position and emission time
//! - `hydrolocate simulate --source x,y,z` - Synthesise arrivals for a known source
//! - `hydrolocate check` - Validate the hydrophone configuration
//!
//! # Architecture
//!
//! As the service layer of the workspace, this crate loads the hydrophone
//! configuration, applies environment overrides and hands the timestamps to
//! `locator_core`. Logs go to stderr so stdout carries only results.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use locator_core::math::differentiation::DEFAULT_RELATIVE_STEP;
use locator_core::types::Unknowns;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;

use commands::{parse_position, parse_unknowns, OutputFormat};
use config::HydrophoneConfig;
pub use error::{CliError, Result};

/// Hydrophone array sound-source locator
#[derive(Parser)]
#[command(name = "hydrolocate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Hydrophone configuration file (TOML)
    #[arg(
        short,
        long,
        global = true,
        env = "HYDROLOCATE_CONFIG",
        default_value = "hydrophones.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate a source from one arrival timestamp per hydrophone
    Locate {
        /// Arrival timestamps in seconds, in configuration order
        #[arg(required = true, allow_negative_numbers = true)]
        timestamps: Vec<f64>,

        /// Starting point as x,y,z,t (defaults to the array centroid)
        #[arg(long, value_parser = parse_unknowns, allow_hyphen_values = true)]
        initial: Option<Unknowns>,

        /// Use central finite differences instead of automatic differentiation
        #[arg(long)]
        finite_difference: bool,

        /// Relative step for finite differences
        #[arg(long, default_value_t = DEFAULT_RELATIVE_STEP)]
        fd_step: f64,

        /// Override the configured iteration budget
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Print the per-iteration solver trace
        #[arg(long)]
        trace: bool,
    },

    /// Synthesise arrival timestamps for a known source
    Simulate {
        /// Source position as x,y,z
        #[arg(short, long, value_parser = parse_position, allow_hyphen_values = true)]
        source: [f64; 3],

        /// Emission time in seconds
        #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
        time: f64,

        /// Standard deviation of Gaussian timing noise in seconds
        #[arg(short, long, default_value_t = 0.0)]
        noise_std: f64,

        /// Seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Validate the hydrophone configuration and summarise the array
    Check,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> Result<HydrophoneConfig> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    Ok(HydrophoneConfig::load(path)?.with_env_override()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_tracing(log_level);
    info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Commands::Locate {
            timestamps,
            initial,
            finite_difference,
            fd_step,
            max_iterations,
            format,
            trace,
        } => {
            let options = commands::locate::LocateOptions {
                initial,
                finite_difference,
                fd_step,
                max_iterations,
                format,
                trace,
            };
            commands::locate::run(&config, &timestamps, &options)
        }
        Commands::Simulate {
            source,
            time,
            noise_std,
            seed,
            format,
        } => commands::simulate::run(&config, source, time, noise_std, seed, format),
        Commands::Check => commands::check::run(&config),
    }
}
