//! Data directory CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Data directory configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Datadir")]
#[serde(default)]
pub struct DataDirArgs {
    /// Root directory for the config file, node key and address book.
    ///
    /// Defaults to `$HOME/.seeder`.
    #[arg(long, value_name = "PATH")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadir: Option<PathBuf>,
}
