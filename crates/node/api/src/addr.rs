//! Listen and seed address parsing.
//!
//! Listen addresses are literal `ip:port`. Seeds may also name a host, which
//! is kept as written and resolved each time it is dialed.

use std::{
    fmt,
    net::{AddrParseError, SocketAddr},
    str::FromStr,
};

use thiserror::Error;

use crate::{NodeId, NodeIdParseError};

/// The only scheme accepted on listen and seed addresses.
const TCP_SCHEME: &str = "tcp";

/// Error parsing a listen or seed address.
#[derive(Debug, Error, PartialEq)]
pub enum AddressParseError {
    #[error("unsupported scheme {scheme:?} in {input:?}, expected tcp")]
    UnsupportedScheme { input: String, scheme: String },
    #[error("invalid socket address {input:?}: {source}")]
    InvalidSocketAddr {
        input: String,
        #[source]
        source: AddrParseError,
    },
    #[error("invalid peer address {input:?}, expected ip:port or host:port")]
    InvalidPeerAddr { input: String },
    #[error("invalid node id in {input:?}: {source}")]
    InvalidNodeId {
        input: String,
        #[source]
        source: NodeIdParseError,
    },
}

/// Split off an optional `tcp://` scheme.
fn strip_scheme(input: &str) -> Result<&str, AddressParseError> {
    let trimmed = input.trim();
    match trimmed.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(TCP_SCHEME) => Ok(rest),
        Some((scheme, _)) => Err(AddressParseError::UnsupportedScheme {
            input: input.to_string(),
            scheme: scheme.to_string(),
        }),
        None => Ok(trimmed),
    }
}

/// Parse `[tcp://]ip:port` into a socket address.
pub fn parse_listen_addr(input: &str) -> Result<SocketAddr, AddressParseError> {
    strip_scheme(input)?
        .parse()
        .map_err(|source| AddressParseError::InvalidSocketAddr {
            input: input.to_string(),
            source,
        })
}

/// Where a peer can be reached.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A literal socket address.
    Socket(SocketAddr),
    /// A host name, resolved when dialed.
    Dns { host: String, port: u16 },
}

impl Endpoint {
    /// The socket address, if this endpoint needs no resolution.
    pub const fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Socket(addr) => Some(*addr),
            Self::Dns { .. } => None,
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::Socket(addr)
    }
}

impl FromStr for Endpoint {
    type Err = AddressParseError;

    /// Parses `[tcp://]ip:port` or `[tcp://]host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = strip_scheme(s)?;
        if let Ok(addr) = rest.parse::<SocketAddr>() {
            return Ok(Self::Socket(addr));
        }

        let invalid = || AddressParseError::InvalidPeerAddr {
            input: s.to_string(),
        };
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if !is_hostname(host) {
            return Err(invalid());
        }
        Ok(Self::Dns {
            host: host.to_ascii_lowercase(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(addr) => write!(f, "{addr}"),
            Self::Dns { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// RFC 1123 host name: dot separated labels of letters, digits and inner hyphens.
fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

/// A dialable peer address, optionally pinned to an expected node id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    /// Node id the remote must present during the handshake, if known.
    pub id: Option<NodeId>,
    /// Where to dial.
    pub endpoint: Endpoint,
}

impl PeerAddr {
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            id: None,
            endpoint: Endpoint::Socket(addr),
        }
    }

    pub const fn with_id(id: NodeId, addr: SocketAddr) -> Self {
        Self {
            id: Some(id),
            endpoint: Endpoint::Socket(addr),
        }
    }

    /// The socket address, if the endpoint needs no resolution.
    pub const fn socket_addr(&self) -> Option<SocketAddr> {
        self.endpoint.socket_addr()
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl FromStr for PeerAddr {
    type Err = AddressParseError;

    /// Parses `[<node-id>@][tcp://]ip:port` or `[<node-id>@][tcp://]host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('@') {
            Some((id, endpoint)) => {
                let id = id
                    .parse()
                    .map_err(|source| AddressParseError::InvalidNodeId {
                        input: s.to_string(),
                        source,
                    })?;
                Ok(Self {
                    id: Some(id),
                    endpoint: endpoint.parse()?,
                })
            }
            None => Ok(Self {
                id: None,
                endpoint: s.parse()?,
            }),
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}@{}", self.endpoint),
            None => write!(f, "{}", self.endpoint),
        }
    }
}

/// Parse a comma separated seed list. Blank entries are skipped.
pub fn parse_seeds(input: &str) -> Result<Vec<PeerAddr>, AddressParseError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse::<PeerAddr>)
        .collect()
}
