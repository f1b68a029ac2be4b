//! Bookkeeping of connected peers.

use std::{collections::HashMap, net::IpAddr, sync::Arc};

use parking_lot::Mutex;
use seeder_node_api::{Direction, NodeId, PeerInfo};
use thiserror::Error;

/// Why a handshaken connection was not admitted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("{0} peer limit reached")]
    LimitReached(Direction),
    #[error("node already connected")]
    AlreadyConnected,
    #[error("IP already connected")]
    DuplicateIp,
}

#[derive(Debug, Default)]
struct State {
    peers: HashMap<NodeId, PeerInfo>,
    inbound: usize,
    outbound: usize,
}

/// Connected peers, shared between the switch loops and session tasks.
#[derive(Debug, Clone)]
pub(crate) struct PeerSet {
    state: Arc<Mutex<State>>,
    max_inbound: usize,
    max_outbound: usize,
    allow_duplicate_ip: bool,
}

impl PeerSet {
    pub(crate) fn new(max_inbound: usize, max_outbound: usize, allow_duplicate_ip: bool) -> Self {
        Self {
            state: Arc::default(),
            max_inbound,
            max_outbound,
            allow_duplicate_ip,
        }
    }

    /// Admit `info`, returning a guard that removes it again on drop.
    pub(crate) fn admit(&self, info: PeerInfo) -> Result<PeerGuard, RejectReason> {
        let mut state = self.state.lock();

        let (count, max) = match info.direction {
            Direction::Inbound => (state.inbound, self.max_inbound),
            Direction::Outbound => (state.outbound, self.max_outbound),
        };
        if count >= max {
            return Err(RejectReason::LimitReached(info.direction));
        }
        if state.peers.contains_key(&info.id) {
            return Err(RejectReason::AlreadyConnected);
        }
        if !self.allow_duplicate_ip && state.contains_ip(info.remote_addr.ip()) {
            return Err(RejectReason::DuplicateIp);
        }

        match info.direction {
            Direction::Inbound => state.inbound += 1,
            Direction::Outbound => state.outbound += 1,
        }
        let id = info.id;
        state.peers.insert(id, info);

        Ok(PeerGuard {
            set: self.clone(),
            id,
        })
    }

    pub(crate) fn snapshot(&self) -> Vec<PeerInfo> {
        self.state.lock().peers.values().cloned().collect()
    }

    pub(crate) fn inbound(&self) -> usize {
        self.state.lock().inbound
    }

    pub(crate) fn outbound(&self) -> usize {
        self.state.lock().outbound
    }

    /// Whether some peer is connected from, or listens on, `addr`.
    pub(crate) fn is_connected_to(&self, addr: std::net::SocketAddr) -> bool {
        self.state
            .lock()
            .peers
            .values()
            .any(|p| p.remote_addr == addr || p.listen_addr == addr)
    }

    fn remove(&self, id: &NodeId) {
        let mut state = self.state.lock();
        if let Some(info) = state.peers.remove(id) {
            match info.direction {
                Direction::Inbound => state.inbound -= 1,
                Direction::Outbound => state.outbound -= 1,
            }
        }
    }
}

impl State {
    fn contains_ip(&self, ip: IpAddr) -> bool {
        self.peers.values().any(|p| p.remote_addr.ip() == ip)
    }
}

/// Keeps a peer registered for as long as its session runs.
#[derive(Debug)]
pub(crate) struct PeerGuard {
    set: PeerSet,
    id: NodeId,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}
