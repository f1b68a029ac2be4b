//! Connection manager: accept loop, dial loop and session supervision.

use std::{
    collections::HashSet,
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use seeder_node_api::{ConnectionManager, Direction, Endpoint, PeerInfo};
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    time::MissedTickBehavior,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, trace, warn};

use crate::{
    peers::PeerSet,
    session::{ProtocolHandler, Session},
    transport::{Connection, TcpTransport},
};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shortest dial round spacing accepted.
const MIN_DIAL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SwitchConfig {
    pub max_inbound: usize,
    pub max_outbound: usize,
    /// Admit several sessions from one IP. Seed nodes see many peers behind NAT.
    pub allow_duplicate_ip: bool,
    /// Spacing of dial rounds. The first round runs at start.
    pub dial_interval: Duration,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            max_inbound: 40,
            max_outbound: 10,
            allow_duplicate_ip: false,
            dial_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SwitchError {
    #[error("switch already started")]
    AlreadyStarted,
    #[error("transport is not listening")]
    NotListening,
    #[error("switch was stopped and cannot be restarted")]
    Stopped,
}

/// Connection manager over a [`TcpTransport`] with a single protocol handler.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Switch {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<TcpTransport>,
    handler: Arc<dyn ProtocolHandler>,
    config: SwitchConfig,
    peers: PeerSet,
    /// Accepted connections still in their handshake.
    handshaking: Arc<AtomicUsize>,
    dialing: Mutex<HashSet<Endpoint>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl std::fmt::Debug for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switch")
            .field("config", &self.inner.config)
            .field("peers", &self.inner.peers)
            .finish_non_exhaustive()
    }
}

impl Switch {
    pub fn new(
        transport: Arc<TcpTransport>,
        handler: Arc<dyn ProtocolHandler>,
        config: SwitchConfig,
    ) -> Self {
        let peers = PeerSet::new(
            config.max_inbound,
            config.max_outbound,
            config.allow_duplicate_ip,
        );
        Self {
            inner: Arc::new(Inner {
                transport,
                handler,
                config,
                peers,
                handshaking: Arc::default(),
                dialing: Mutex::default(),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.inner.config
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }
}

/// Holds one inbound handshake slot until dropped.
struct HandshakeSlot(Arc<AtomicUsize>);

impl HandshakeSlot {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for HandshakeSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Inner {
    fn spawn_cancellable<F>(self: &Arc<Self>, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = fut => {}
            }
        });
    }

    async fn accept_loop(self: Arc<Self>, listener: Arc<TcpListener>, closed: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = closed.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, remote) = match accepted {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            // only this loop acquires slots, so the check cannot race another accept
            let pending = self.handshaking.load(Ordering::Acquire);
            if self.peers.inbound() + pending >= self.config.max_inbound {
                trace!(%remote, pending, "Inbound limit reached, dropping connection");
                counter!("switch_peers_rejected_total", "reason" => "inbound_limit").increment(1);
                continue;
            }

            let slot = HandshakeSlot::acquire(&self.handshaking);
            let inner = self.clone();
            self.spawn_cancellable(async move { inner.inbound(stream, remote, slot).await });
        }
        debug!("Accept loop stopped");
    }

    async fn inbound(self: Arc<Self>, stream: TcpStream, remote: SocketAddr, slot: HandshakeSlot) {
        match self
            .transport
            .upgrade(stream, remote, Direction::Inbound, None)
            .await
        {
            Ok(conn) => self.serve(conn, Some(slot)).await,
            Err(error) => {
                debug!(%remote, %error, "Inbound handshake failed");
                counter!("switch_handshake_failures_total").increment(1);
            }
        }
    }

    async fn dial_loop(self: Arc<Self>) {
        if self.config.max_outbound == 0 {
            debug!("Outbound limit is zero, not dialing");
            return;
        }

        let mut interval = tokio::time::interval(self.config.dial_interval.max(MIN_DIAL_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => self.dial_round(),
            }
        }
        debug!("Dial loop stopped");
    }

    fn dial_round(self: &Arc<Self>) {
        let in_flight = self.dialing.lock().len();
        let slots = self
            .config
            .max_outbound
            .saturating_sub(self.peers.outbound() + in_flight);
        if slots == 0 {
            trace!("No free outbound slots");
            return;
        }

        let local = self.transport.local_addr();
        let candidates = self.handler.dial_candidates(slots);
        trace!(slots, candidates = candidates.len(), "Dial round");

        for target in candidates {
            if let Some(addr) = target.socket_addr()
                && (Some(addr) == local || self.peers.is_connected_to(addr))
            {
                continue;
            }
            let endpoint = target.endpoint.clone();
            if !self.dialing.lock().insert(endpoint.clone()) {
                continue;
            }

            counter!("switch_dials_total").increment(1);
            let inner = self.clone();
            self.spawn_cancellable(async move {
                let dialed = inner.transport.dial(target).await;
                inner.dialing.lock().remove(&endpoint);
                match dialed {
                    Ok(conn) => inner.serve(conn, None).await,
                    Err(error) => {
                        debug!(%endpoint, %error, "Dial failed");
                        counter!("switch_dial_failures_total").increment(1);
                    }
                }
            });
        }
    }

    /// Admit `conn` and run the handler. An inbound handshake slot is held
    /// until the peer counts against the cap itself.
    async fn serve(&self, conn: Connection, slot: Option<HandshakeSlot>) {
        let info = conn.peer_info();
        let admitted = self.peers.admit(info.clone());
        drop(slot);
        let _guard = match admitted {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(peer = %info, %reason, "Rejected peer");
                counter!("switch_peers_rejected_total", "reason" => "admission").increment(1);
                return;
            }
        };

        counter!("switch_sessions_total", "direction" => info.direction.to_string()).increment(1);
        debug!(peer = %info, moniker = %info.moniker, "Peer connected");
        self.handler
            .handle_session(Session::new(conn, self.handler.channel()))
            .await;
        debug!(peer = %info, "Peer disconnected");
    }
}

#[async_trait]
impl ConnectionManager for Switch {
    type Error = SwitchError;

    fn start(&self) -> Result<(), SwitchError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(SwitchError::Stopped);
        }
        let (listener, closed) = inner
            .transport
            .accept_handle()
            .ok_or(SwitchError::NotListening)?;
        if inner.started.swap(true, Ordering::AcqRel) {
            return Err(SwitchError::AlreadyStarted);
        }

        inner.tracker.spawn(inner.clone().accept_loop(listener, closed));
        inner.tracker.spawn(inner.clone().dial_loop());

        info!(
            max_inbound = inner.config.max_inbound,
            max_outbound = inner.config.max_outbound,
            channel = %inner.handler.channel(),
            "Switch started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), SwitchError> {
        let inner = &self.inner;
        inner.cancel.cancel();
        inner.tracker.close();
        inner.tracker.wait().await;
        info!("Switch stopped");
        Ok(())
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.inner.peers.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::descriptor;
    use assert_matches::assert_matches;
    use seeder_node_api::{ChannelId, PEX_CHANNEL, PeerAddr, Transport};
    use std::sync::atomic::AtomicUsize;
    use tokio::{io::AsyncReadExt, sync::mpsc};

    struct Recorder {
        candidates: Mutex<Vec<PeerAddr>>,
        candidate_calls: AtomicUsize,
        sessions: mpsc::UnboundedSender<PeerInfo>,
    }

    impl Recorder {
        fn new(candidates: Vec<PeerAddr>) -> (Arc<Self>, mpsc::UnboundedReceiver<PeerInfo>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let recorder = Self {
                candidates: Mutex::new(candidates),
                candidate_calls: AtomicUsize::new(0),
                sessions: tx,
            };
            (Arc::new(recorder), rx)
        }
    }

    #[async_trait]
    impl ProtocolHandler for Recorder {
        fn channel(&self) -> ChannelId {
            PEX_CHANNEL
        }

        fn dial_candidates(&self, max: usize) -> Vec<PeerAddr> {
            self.candidate_calls.fetch_add(1, Ordering::SeqCst);
            let mut candidates = self.candidates.lock();
            let n = max.min(candidates.len());
            candidates.drain(..n).collect()
        }

        async fn handle_session(&self, mut session: Session) {
            let _ = self.sessions.send(session.peer().clone());
            while let Ok(Some(_)) = session.recv().await {}
        }
    }

    async fn listening(id: u8, config: SwitchConfig, handler: Arc<Recorder>) -> (Switch, SocketAddr) {
        let transport = Arc::new(TcpTransport::new(descriptor(id, "net")));
        let addr = transport.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        (Switch::new(transport, handler, config), addr)
    }

    fn config(max_inbound: usize, max_outbound: usize) -> SwitchConfig {
        SwitchConfig {
            max_inbound,
            max_outbound,
            allow_duplicate_ip: true,
            dial_interval: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_start_preconditions() {
        let (handler, _rx) = Recorder::new(vec![]);
        let transport = Arc::new(TcpTransport::new(descriptor(1, "net")));
        let switch = Switch::new(transport.clone(), handler, config(1, 1));

        assert_eq!(switch.start(), Err(SwitchError::NotListening));
        assert!(!switch.is_started());

        transport.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        switch.start().unwrap();
        assert_eq!(switch.start(), Err(SwitchError::AlreadyStarted));

        switch.stop().await.unwrap();
        assert_eq!(switch.start(), Err(SwitchError::Stopped));
        // stopping twice is harmless
        switch.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_and_accept_sessions() {
        let (server_handler, mut server_sessions) = Recorder::new(vec![]);
        let (server, server_addr) = listening(1, config(4, 0), server_handler).await;
        server.start().unwrap();

        let (client_handler, mut client_sessions) = Recorder::new(vec![PeerAddr::new(server_addr)]);
        let (client, _) = listening(2, config(0, 4), client_handler).await;
        client.start().unwrap();

        let outbound = tokio::time::timeout(Duration::from_secs(5), client_sessions.recv())
            .await
            .unwrap()
            .unwrap();
        let inbound = tokio::time::timeout(Duration::from_secs(5), server_sessions.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outbound.direction, Direction::Outbound);
        assert_eq!(outbound.listen_addr, server_addr);
        assert_eq!(inbound.direction, Direction::Inbound);
        assert_eq!(client.peers().len(), 1);
        assert_eq!(server.peers().len(), 1);

        client.stop().await.unwrap();
        assert!(client.peers().is_empty());

        // the server notices the hang-up and forgets the peer
        tokio::time::timeout(Duration::from_secs(5), async {
            while !server.peers().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_caps() {
        let (handler, _rx) = Recorder::new(vec![PeerAddr::new("127.0.0.1:9".parse().unwrap())]);
        let (switch, addr) = listening(1, config(0, 0), handler.clone()).await;
        switch.start().unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
            .await
            .unwrap();
        assert_matches!(read, Ok(0));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handler.candidate_calls.load(Ordering::SeqCst), 0);
        assert!(switch.peers().is_empty());
        switch.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_inbound_cap_counts_pending_handshakes() {
        let (handler, _rx) = Recorder::new(vec![]);
        let (switch, addr) = listening(1, config(1, 0), handler).await;
        switch.start().unwrap();

        // none of these ever send a descriptor, so all stay in the handshake
        let mut streams = Vec::new();
        for _ in 0..5 {
            streams.push(TcpStream::connect(addr).await.unwrap());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut greeted = 0;
        for stream in &mut streams {
            let mut buf = [0u8; 64];
            let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf)).await;
            if matches!(read, Ok(Ok(n)) if n > 0) {
                greeted += 1;
            }
        }
        assert_eq!(greeted, 1);
        switch.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_closing_transport_releases_socket() {
        let (handler, _rx) = Recorder::new(vec![]);
        let transport = Arc::new(TcpTransport::new(descriptor(1, "net")));
        let addr = transport.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let switch = Switch::new(transport.clone(), handler, config(4, 0));
        switch.start().unwrap();

        // the switch is never stopped, as when stopping runs past its deadline
        transport.close().unwrap();
        let rebound = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match TcpListener::bind(addr).await {
                    Ok(listener) => return listener,
                    Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(rebound.local_addr().unwrap(), addr);
        switch.stop().await.unwrap();
    }
}
