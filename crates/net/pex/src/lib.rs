//! Peer exchange (PEX) in seed mode.
//!
//! A seed node does not keep peers around. It dials addresses, asks each
//! peer once for the addresses it knows, stores them in the address book and
//! hangs up. Inbound peers get one random sample of the book and are then
//! disconnected, or dropped after a grace period if they never ask. Inbound
//! peers that push addresses unasked are dropped on the spot.

mod message;
mod service;

use seeder_net_switch::SessionError;
use thiserror::Error;

pub use message::{MAX_ADDRS, PexMessage};
pub use service::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_INTERVAL, PexConfig, PexService};

#[derive(Debug, Error)]
pub enum PexError {
    #[error("malformed message: {0}")]
    Codec(#[from] postcard::Error),
    #[error("{0} addresses exceed the per-message limit")]
    TooManyAddrs(usize),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("peer closed the session")]
    Closed,
    #[error("no addresses received in time")]
    Timeout,
    #[error("peer pushed {0} addresses without being asked")]
    Unsolicited(usize),
}
