//! TCP transport: binds the listener, dials peers and runs the handshake.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use seeder_node_api::{
    Direction, Endpoint, NodeDescriptor, NodeId, PeerAddr, PeerInfo, Transport,
};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, lookup_host};
use tokio_util::{
    codec::{Framed, LengthDelimitedCodec},
    sync::CancellationToken,
};
use tracing::{debug, info, trace};

use crate::frame;

/// Default time allowed for the descriptor exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for a TCP connect.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("already listening on {0}")]
    AlreadyListening(SocketAddr),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("{0} did not resolve to any address")]
    Unresolved(String),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connection closed during handshake")]
    Closed,
    #[error("malformed descriptor: {0}")]
    Codec(#[from] postcard::Error),
    #[error("network mismatch: local {local:?}, remote {remote:?}")]
    NetworkMismatch { local: String, remote: String },
    #[error("remote presented our own node id")]
    SelfConnection,
    #[error("no channel in common")]
    NoCommonChannel,
    #[error("expected node {expected}, got {actual}")]
    UnexpectedNodeId { expected: NodeId, actual: NodeId },
}

/// Decide whether a session with `remote` may proceed.
pub fn check_compatible(
    local: &NodeDescriptor,
    remote: &NodeDescriptor,
    expected: Option<NodeId>,
) -> Result<(), HandshakeError> {
    if let Some(expected) = expected
        && expected != remote.node_id
    {
        return Err(HandshakeError::UnexpectedNodeId {
            expected,
            actual: remote.node_id,
        });
    }
    if remote.node_id == local.node_id {
        return Err(HandshakeError::SelfConnection);
    }
    if remote.network != local.network {
        return Err(HandshakeError::NetworkMismatch {
            local: local.network.clone(),
            remote: remote.network.clone(),
        });
    }
    if !local.shares_channel_with(remote) {
        return Err(HandshakeError::NoCommonChannel);
    }
    Ok(())
}

/// A connection that completed the handshake.
#[derive(Debug)]
pub struct Connection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    remote_addr: SocketAddr,
    direction: Direction,
    remote: NodeDescriptor,
}

impl Connection {
    /// Descriptor the remote sent during the handshake.
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.remote
    }

    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            id: self.remote.node_id,
            remote_addr: self.remote_addr,
            listen_addr: self.remote.listen_addr,
            direction: self.direction,
            moniker: self.remote.moniker.clone(),
        }
    }

    pub(crate) fn into_framed(self) -> Framed<TcpStream, LengthDelimitedCodec> {
        self.framed
    }
}

/// The bound socket and the token that tells its accept loop to let go.
#[derive(Debug)]
struct Listening {
    listener: Arc<TcpListener>,
    closed: CancellationToken,
}

/// TCP transport bound to this node's descriptor.
#[derive(Debug)]
pub struct TcpTransport {
    descriptor: RwLock<NodeDescriptor>,
    listening: Mutex<Option<Listening>>,
    handshake_timeout: Duration,
    dial_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport. No socket is opened until [`Transport::listen`].
    pub fn new(descriptor: NodeDescriptor) -> Self {
        Self {
            descriptor: RwLock::new(descriptor),
            listening: Mutex::new(None),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, handshake: Duration, dial: Duration) -> Self {
        self.handshake_timeout = handshake;
        self.dial_timeout = dial;
        self
    }

    /// The descriptor sent to peers. Its `listen_addr` tracks the bound socket.
    pub fn descriptor(&self) -> NodeDescriptor {
        self.descriptor.read().clone()
    }

    /// The bound listener, if listening.
    pub fn listener(&self) -> Option<Arc<TcpListener>> {
        self.listening.lock().as_ref().map(|l| l.listener.clone())
    }

    /// The listener together with a token cancelled by [`Transport::close`].
    ///
    /// Accept loops must drop their listener once the token fires so that
    /// closing really releases the socket.
    pub(crate) fn accept_handle(&self) -> Option<(Arc<TcpListener>, CancellationToken)> {
        self.listening
            .lock()
            .as_ref()
            .map(|l| (l.listener.clone(), l.closed.clone()))
    }

    /// The bound address, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener().and_then(|l| l.local_addr().ok())
    }

    /// Connect to `target` and run the handshake.
    ///
    /// Host names are resolved on every dial. Resolved addresses are tried in
    /// order until one accepts, all within the dial timeout.
    pub async fn dial(&self, target: PeerAddr) -> Result<Connection, TransportError> {
        let (stream, remote_addr) =
            tokio::time::timeout(self.dial_timeout, connect(&target.endpoint))
                .await
                .map_err(|_| TransportError::Timeout("dial"))??;
        self.upgrade(stream, remote_addr, Direction::Outbound, target.id)
            .await
    }

    /// Run the handshake on an established stream.
    pub async fn upgrade(
        &self,
        stream: TcpStream,
        remote_addr: SocketAddr,
        direction: Direction,
        expected: Option<NodeId>,
    ) -> Result<Connection, TransportError> {
        stream.set_nodelay(true)?;
        let mut framed = Framed::new(stream, frame::codec());

        let remote = tokio::time::timeout(
            self.handshake_timeout,
            self.exchange_descriptors(&mut framed),
        )
        .await
        .map_err(|_| TransportError::Timeout("handshake"))??;

        check_compatible(&self.descriptor.read(), &remote, expected)?;
        debug!(%remote_addr, %direction, node_id = %remote.node_id, moniker = %remote.moniker, "Handshake complete");

        Ok(Connection {
            framed,
            remote_addr,
            direction,
            remote,
        })
    }

    async fn exchange_descriptors(
        &self,
        framed: &mut Framed<TcpStream, LengthDelimitedCodec>,
    ) -> Result<NodeDescriptor, TransportError> {
        let local = postcard::to_allocvec(&self.descriptor()).map_err(HandshakeError::from)?;
        framed.send(Bytes::from(local)).await?;

        let frame = framed.next().await.ok_or(HandshakeError::Closed)??;
        Ok(postcard::from_bytes(&frame).map_err(HandshakeError::from)?)
    }
}

async fn connect(endpoint: &Endpoint) -> Result<(TcpStream, SocketAddr), TransportError> {
    let (host, port) = match endpoint {
        Endpoint::Socket(addr) => return Ok((TcpStream::connect(*addr).await?, *addr)),
        Endpoint::Dns { host, port } => (host.as_str(), *port),
    };

    let mut last_error = None;
    for addr in lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(error) => {
                trace!(%endpoint, %addr, %error, "Connect failed, trying next address");
                last_error = Some(error);
            }
        }
    }
    Err(match last_error {
        Some(error) => error.into(),
        None => TransportError::Unresolved(endpoint.to_string()),
    })
}

#[async_trait]
impl Transport for TcpTransport {
    type Error = TransportError;

    async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, TransportError> {
        if let Some(bound) = self.local_addr() {
            return Err(TransportError::AlreadyListening(bound));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let bound = listener.local_addr()?;

        *self.listening.lock() = Some(Listening {
            listener: Arc::new(listener),
            closed: CancellationToken::new(),
        });
        self.descriptor.write().listen_addr = bound;

        info!(%bound, "Transport listening");
        Ok(bound)
    }

    fn close(&self) -> Result<(), TransportError> {
        if let Some(listening) = self.listening.lock().take() {
            listening.closed.cancel();
            debug!(addr = ?listening.listener.local_addr().ok(), "Transport closed");
        }
        Ok(())
    }
}
