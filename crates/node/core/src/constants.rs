//! Constants used throughout the seeder.
//!
//! Defaults for every configuration field live here so that the config
//! struct, the CLI help text and the tests agree on them.

use seeder_node_api::ProtocolVersion;

// =============================================================================
// Network Addresses
// =============================================================================

/// Default P2P listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "tcp://0.0.0.0:26656";

// =============================================================================
// Connection Limits
// =============================================================================

/// Default maximum number of inbound sessions.
pub const DEFAULT_MAX_INBOUND: usize = 3000;

/// Default maximum number of outbound sessions.
pub const DEFAULT_MAX_OUTBOUND: usize = 1000;

// =============================================================================
// Timeouts & Intervals
// =============================================================================

/// Default period of the supervisory loop.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Default upper bound on stopping the connection manager.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Default time an inbound peer may stay connected in seed mode.
pub const DEFAULT_SEED_DISCONNECT_WAIT_SECS: u64 = 180;

/// Default period between dial rounds.
pub const DEFAULT_DIAL_INTERVAL_SECS: u64 = 30;

// =============================================================================
// Protocol Identification
// =============================================================================

/// P2P protocol version advertised in the handshake.
pub const P2P_PROTOCOL: u64 = 8;

/// Block protocol version advertised in the handshake.
pub const BLOCK_PROTOCOL: u64 = 11;

/// Full protocol version tuple.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(P2P_PROTOCOL, BLOCK_PROTOCOL, 0);

/// Suffix appended to the chain id to form the moniker.
pub const MONIKER_SUFFIX: &str = "-seeder";

// =============================================================================
// File System
// =============================================================================

/// Default data directory name under `$HOME`.
pub const DEFAULT_DATA_DIR_NAME: &str = ".seeder";

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default node key file, relative to the data directory.
pub const DEFAULT_NODE_KEY_FILE: &str = "node_key.json";

/// Default address book file, relative to the data directory.
pub const DEFAULT_ADDR_BOOK_FILE: &str = "addrbook.json";

/// Restrictive file permissions for sensitive files (Unix: owner read/write only).
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Permissions for the data directory (Unix: owner only).
pub const DATA_DIR_MODE: u32 = 0o700;
