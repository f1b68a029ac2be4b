//! Connected peer snapshot types.

use std::{fmt, net::SocketAddr};

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Which side opened the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub const fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// A connected peer, as reported by the connection manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: NodeId,
    /// Address of the socket we are talking to.
    pub remote_addr: SocketAddr,
    /// Address the peer says it listens on.
    pub listen_addr: SocketAddr,
    pub direction: Direction,
    pub moniker: String,
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.id, self.remote_addr, self.direction)
    }
}
