//! Seeder runtime configuration.
//!
//! [`SeedConfig`] mirrors the TOML config file. Layering of the file,
//! environment and CLI flags happens in `seeder-node-commands`; this module
//! only owns the shape, the defaults and the derived values.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use seeder_node_api::{AddressParseError, PeerAddr, parse_listen_addr, parse_seeds};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ADDR_BOOK_FILE, DEFAULT_DIAL_INTERVAL_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_INBOUND,
    DEFAULT_MAX_OUTBOUND, DEFAULT_NODE_KEY_FILE, DEFAULT_SEED_DISCONNECT_WAIT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_TICK_INTERVAL_SECS, MONIKER_SUFFIX,
};

/// Complete seeder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Network identifier.
    pub chain_id: String,

    /// Comma separated seed nodes used to discover peers.
    pub seeds: String,

    /// Address to listen for incoming connections.
    #[serde(rename = "listen")]
    pub listen_addr: String,

    /// Path to the node key, relative to the data directory or absolute.
    pub node_key_file: PathBuf,

    /// Path to the address book, relative to the data directory or absolute.
    pub addr_book_file: PathBuf,

    /// Use strict routability rules (keep false for private or local networks).
    pub addr_book_strict: bool,

    /// Maximum number of inbound connections.
    pub max_inbound: usize,

    /// Maximum number of outbound connections.
    pub max_outbound: usize,

    /// Also save the address book on every supervisory tick.
    pub persist_on_tick: bool,

    /// Period of the supervisory loop, in seconds.
    pub tick_interval_secs: u64,

    /// How long stopping the connection manager may take, in seconds.
    pub shutdown_timeout_secs: u64,

    /// How long an inbound peer may stay connected, in seconds.
    pub seed_disconnect_wait_secs: u64,

    /// Period between dial rounds, in seconds.
    pub dial_interval_secs: u64,

    /// Serve Prometheus metrics on this address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            seeds: String::new(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            node_key_file: PathBuf::from(DEFAULT_NODE_KEY_FILE),
            addr_book_file: PathBuf::from(DEFAULT_ADDR_BOOK_FILE),
            addr_book_strict: false,
            max_inbound: DEFAULT_MAX_INBOUND,
            max_outbound: DEFAULT_MAX_OUTBOUND,
            persist_on_tick: false,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            seed_disconnect_wait_secs: DEFAULT_SEED_DISCONNECT_WAIT_SECS,
            dial_interval_secs: DEFAULT_DIAL_INTERVAL_SECS,
            metrics_addr: None,
        }
    }
}

impl SeedConfig {
    /// Parsed listen address.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, AddressParseError> {
        parse_listen_addr(&self.listen_addr)
    }

    /// Parsed seed list.
    pub fn seed_addrs(&self) -> Result<Vec<PeerAddr>, AddressParseError> {
        parse_seeds(&self.seeds)
    }

    /// Check that every address field parses.
    pub fn validate(&self) -> Result<(), AddressParseError> {
        self.listen_socket_addr()?;
        self.seed_addrs()?;
        Ok(())
    }

    /// Display name advertised to peers.
    pub fn moniker(&self) -> String {
        format!("{}{MONIKER_SUFFIX}", self.chain_id)
    }

    /// Node key location, resolved against `root`.
    pub fn node_key_path(&self, root: &Path) -> PathBuf {
        root.join(&self.node_key_file)
    }

    /// Address book location, resolved against `root`.
    pub fn addr_book_path(&self, root: &Path) -> PathBuf {
        root.join(&self.addr_book_file)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn seed_disconnect_wait(&self) -> Duration {
        Duration::from_secs(self.seed_disconnect_wait_secs)
    }

    pub fn dial_interval(&self) -> Duration {
        Duration::from_secs(self.dial_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SeedConfig::default();
        assert_eq!(config.chain_id, "");
        assert_eq!(config.listen_addr, "tcp://0.0.0.0:26656");
        assert_eq!(config.max_inbound, 3000);
        assert_eq!(config.max_outbound, 1000);
        assert!(!config.addr_book_strict);
        assert!(!config.persist_on_tick);
        assert_eq!(config.tick_interval(), Duration::from_secs(30));
        assert!(config.seed_addrs().unwrap().is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SeedConfig = toml::from_str(
            r#"
chain_id = "cosmoshub-4"
listen = "tcp://127.0.0.1:36656"
max_inbound = 0
"#,
        )
        .unwrap();

        assert_eq!(config.chain_id, "cosmoshub-4");
        assert_eq!(config.listen_socket_addr().unwrap(), "127.0.0.1:36656".parse().unwrap());
        assert_eq!(config.max_inbound, 0);
        assert_eq!(config.max_outbound, 1000);
        assert_eq!(config.moniker(), "cosmoshub-4-seeder");
    }

    #[test]
    fn test_relative_and_absolute_paths() {
        let root = Path::new("/var/lib/seeder");
        let mut config = SeedConfig::default();
        assert_eq!(
            config.node_key_path(root),
            PathBuf::from("/var/lib/seeder/node_key.json")
        );

        config.addr_book_file = PathBuf::from("/srv/book.json");
        assert_eq!(config.addr_book_path(root), PathBuf::from("/srv/book.json"));
    }

    #[test]
    fn test_validate_rejects_bad_seed() {
        let config = SeedConfig {
            seeds: "203.0.113.5:26656,bogus".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
