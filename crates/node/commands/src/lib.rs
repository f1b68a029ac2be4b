//! CLI commands for the seeder.
//!
//! This crate provides the command-line interface:
//! - [`Cli`] - Top-level CLI parser
//! - [`config`] - Layered loading of [`SeedConfig`](seeder_node_core::config::SeedConfig)
//! - [`commands::run`] - Runs the seed node until a termination signal
//!
//! Configuration is loaded using Figment with the following priority
//! (highest wins):
//!
//! 1. CLI arguments
//! 2. Environment variables (`CHAIN`, `SEEDS`)
//! 3. Config file (TOML)
//! 4. Defaults

mod cli;
pub mod commands;
pub mod config;
pub mod metrics;
pub mod signals;

pub use cli::Cli;
pub use config::{EnvOverrides, load_config};

use clap::Parser;
use seeder_node_core::{logging, version};
use tracing::info;

/// Run the seeder with the process arguments.
///
/// This is the main entry point that should be called from the binary.
pub async fn run() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;

    info!(version = version::VERSION, sha = version::GIT_SHA, "Starting seeder");
    commands::run::run(cli).await
}
