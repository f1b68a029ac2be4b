//! Node descriptor exchanged during the handshake.

use std::{fmt, net::SocketAddr};

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Logical channel multiplexed over a single connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

/// Peer-exchange channel.
pub const PEX_CHANNEL: ChannelId = ChannelId(0x00);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Protocol version tuple advertised to peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub p2p: u64,
    pub block: u64,
    pub app: u64,
}

impl ProtocolVersion {
    pub const fn new(p2p: u64, block: u64, app: u64) -> Self {
        Self { p2p, block, app }
    }
}

/// Everything a node tells its peers about itself.
///
/// Derived at startup from the identity and configuration, never persisted.
/// `listen_addr` must equal the address the transport actually bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub node_id: NodeId,
    pub network: String,
    pub protocol: ProtocolVersion,
    pub listen_addr: SocketAddr,
    pub channels: Vec<ChannelId>,
    pub moniker: String,
    pub version: String,
}

impl NodeDescriptor {
    /// Whether the node speaks the given channel.
    pub fn supports(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel)
    }

    /// Whether the two nodes have at least one channel in common.
    pub fn shares_channel_with(&self, other: &Self) -> bool {
        self.channels.iter().any(|c| other.supports(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(channels: Vec<ChannelId>) -> NodeDescriptor {
        NodeDescriptor {
            node_id: "8f2a55949038a9610f50fb23b5883af3b4ecb3c3".parse().unwrap(),
            network: "testnet-1".to_string(),
            protocol: ProtocolVersion::new(8, 11, 0),
            listen_addr: "127.0.0.1:26656".parse().unwrap(),
            channels,
            moniker: "testnet-1-seeder".to_string(),
            version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_channel_overlap() {
        let pex = descriptor(vec![PEX_CHANNEL]);
        let other = descriptor(vec![ChannelId(0x20), PEX_CHANNEL]);
        let disjoint = descriptor(vec![ChannelId(0x20)]);

        assert!(pex.supports(PEX_CHANNEL));
        assert!(pex.shares_channel_with(&other));
        assert!(!pex.shares_channel_with(&disjoint));
    }

    #[test]
    fn test_postcard_roundtrip() {
        let d = descriptor(vec![PEX_CHANNEL]);
        let bytes = postcard::to_allocvec(&d).unwrap();
        let back: NodeDescriptor = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, d);
    }
}
