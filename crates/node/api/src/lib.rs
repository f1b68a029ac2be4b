//! Seeder node API - primitives and capability traits.
//!
//! This crate is the contract boundary between the orchestrator and the
//! components it drives:
//!
//! - [`NodeId`], [`NodeDescriptor`], [`PeerAddr`], [`PeerInfo`] - shared primitives
//! - [`Transport`] - binds and releases the listening socket
//! - [`ConnectionManager`] - accepts, dials and tracks peer sessions
//! - [`AddressBook`] / [`AddressStore`] - the persisted set of known addresses
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │ Orchestrator │
//!                  └──────┬───────┘
//!        listen/close     │ start/stop/peers      size/save
//!      ┌──────────────────┼──────────────────────────┐
//!      ▼                  ▼                          ▼
//! ┌───────────┐  ┌───────────────────┐       ┌─────────────┐
//! │ Transport │◄─│ ConnectionManager │──────►│ AddressStore│
//! └───────────┘  └───────────────────┘  pex  └─────────────┘
//! ```

mod addr;
mod descriptor;
mod node_id;
mod peer;
mod traits;

pub use addr::{AddressParseError, Endpoint, PeerAddr, parse_listen_addr, parse_seeds};
pub use descriptor::{ChannelId, NodeDescriptor, PEX_CHANNEL, ProtocolVersion};
pub use node_id::{NodeId, NodeIdParseError};
pub use peer::{Direction, PeerInfo};
pub use traits::{AddressBook, AddressStore, ConnectionManager, Transport};
