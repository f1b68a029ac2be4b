//! Top-level CLI parser.

use clap::Parser;
use seeder_node_core::version::LONG_VERSION;

pub use seeder_node_core::args::{DataDirArgs, LogArgs, NetworkArgs};

/// Seed node for peer discovery: crawls the network and serves peer addresses.
#[derive(Debug, Parser)]
#[command(name = "seeder", author, version, long_version = LONG_VERSION.as_str(), about, long_about = None)]
pub struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub logs: LogArgs,

    /// Data directory configuration.
    #[command(flatten)]
    pub datadir: DataDirArgs,

    /// Network overrides.
    #[command(flatten)]
    pub network: NetworkArgs,
}
