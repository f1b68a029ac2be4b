//! Seed network CLI arguments.
//!
//! Every field is optional: an absent flag leaves the value from the
//! environment or the config file in place. Field names serialize to the
//! config file keys so the struct can be layered directly over the file.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Network overrides given on the command line.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Network")]
pub struct NetworkArgs {
    /// Network identifier (overrides `CHAIN` and `chain_id`).
    #[arg(long = "chain-id", value_name = "ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,

    /// Comma separated seed nodes, each `[<node-id>@]ip:port` or `[<node-id>@]host:port` (overrides `SEEDS` and `seeds`).
    #[arg(long, value_name = "LIST")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<String>,

    /// Address to listen on for incoming connections, `[tcp://]ip:port`.
    #[arg(long = "listen-addr", value_name = "ADDR")]
    #[serde(rename = "listen", skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long = "metrics", value_name = "ADDR")]
    #[serde(rename = "metrics_addr", skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<SocketAddr>,
}
