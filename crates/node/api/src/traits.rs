//! Capability traits consumed by the orchestrator.
//!
//! Each trait carries its own error type so that concrete collaborators
//! and test stubs can report failures without a shared error enum.

use std::{net::SocketAddr, time::Duration};

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::PeerInfo;

/// Listening side of the network stack.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Bind `addr` and return the address actually bound.
    ///
    /// Binding port `0` yields the ephemeral port chosen by the OS.
    async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, Self::Error>;

    /// Release the bound socket. Calling it more than once is a no-op.
    fn close(&self) -> Result<(), Self::Error>;
}

/// Accepts inbound sessions, dials outbound ones and enforces caps.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ConnectionManager: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin accepting and dialing. Requires a listening transport.
    fn start(&self) -> Result<(), Self::Error>;

    /// Disconnect every session and wait for background work to finish.
    async fn stop(&self) -> Result<(), Self::Error>;

    /// Snapshot of the currently connected peers.
    fn peers(&self) -> Vec<PeerInfo>;
}

/// What the orchestrator needs from the address book.
#[auto_impl(&, Box, Arc)]
pub trait AddressBook: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of known addresses.
    fn size(&self) -> usize;

    /// Durably write the current state.
    fn save(&self) -> Result<(), Self::Error>;
}

/// Address book operations used by the peer-exchange protocol.
#[auto_impl(&, Box, Arc)]
pub trait AddressStore: AddressBook {
    /// Insert `addr`, learned from `src`. Returns `true` if it was new.
    fn add_address(&self, addr: SocketAddr, src: Option<SocketAddr>) -> bool;

    /// Record a dial attempt.
    fn mark_attempt(&self, addr: SocketAddr);

    /// Record a successful exchange.
    fn mark_good(&self, addr: SocketAddr);

    /// Up to `max` addresses chosen uniformly at random.
    fn sample(&self, max: usize) -> Vec<SocketAddr>;

    /// Up to `max` addresses not attempted within `retry_after`, least tried first.
    fn dial_candidates(&self, max: usize, retry_after: Duration) -> Vec<SocketAddr>;
}
