//! Stable node identifier.

use std::{fmt, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier derived from the node's public key.
///
/// Rendered as 40 lowercase hex characters without a `0x` prefix, which is
/// also the form used in `<id>@<ip>:<port>` seed strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Address);

impl NodeId {
    /// Wrap an address derived from a public key.
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// The underlying address.
    pub const fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for NodeId {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_slice()))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

/// Error parsing a [`NodeId`] from hex.
#[derive(Debug, Error, PartialEq)]
#[error("invalid node id: {0}")]
pub struct NodeIdParseError(#[from] hex::FromHexError);

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(Address::from(bytes)))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
