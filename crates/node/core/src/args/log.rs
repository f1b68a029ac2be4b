//! Logging CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Logging")]
#[serde(default)]
pub struct LogArgs {
    /// Silence all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    #[serde(skip)] // CLI-only, count action doesn't make sense in config
    pub verbosity: u8,

    /// Log filter directive (e.g., "seeder_net_pex=debug,seeder_net_switch=info").
    #[arg(long = "log.filter", value_name = "DIRECTIVE", global = true)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Use JSON format for log output.
    #[arg(long = "log.json", global = true)]
    pub json: bool,
}
