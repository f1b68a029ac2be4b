//! Seed-mode PEX handler.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use seeder_net_switch::{ProtocolHandler, Session};
use seeder_node_api::{
    AddressStore, ChannelId, Direction, Endpoint, PEX_CHANNEL, PeerAddr, PeerInfo,
};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{MAX_ADDRS, PexError, PexMessage};

/// Default wait for an `Addrs` reply after sending a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum spacing between dials of the same address.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct PexConfig {
    /// Dialed before anything learned from the address book.
    pub seeds: Vec<PeerAddr>,
    /// How long an inbound peer may stay connected without asking for addresses.
    pub seed_disconnect_wait: Duration,
    pub request_timeout: Duration,
    pub retry_interval: Duration,
}

impl PexConfig {
    pub fn new(seeds: Vec<PeerAddr>, seed_disconnect_wait: Duration) -> Self {
        Self {
            seeds,
            seed_disconnect_wait,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Harvests addresses from outbound peers and serves samples to inbound ones.
///
/// Every session is short-lived: outbound sessions end after one request,
/// inbound sessions after one answer or the disconnect wait.
#[derive(Debug)]
pub struct PexService<B> {
    book: B,
    config: PexConfig,
    seed_attempts: Mutex<HashMap<Endpoint, Instant>>,
}

impl<B: AddressStore> PexService<B> {
    pub fn new(book: B, config: PexConfig) -> Self {
        Self {
            book,
            config,
            seed_attempts: Mutex::default(),
        }
    }

    pub fn book(&self) -> &B {
        &self.book
    }

    pub fn config(&self) -> &PexConfig {
        &self.config
    }

    /// Seeds not dialed within the retry interval. Returned seeds count as attempted.
    fn due_seeds(&self, max: usize) -> Vec<PeerAddr> {
        let now = Instant::now();
        let mut attempts = self.seed_attempts.lock();
        let mut due = Vec::new();
        for seed in &self.config.seeds {
            if due.len() >= max {
                break;
            }
            let is_due = attempts
                .get(&seed.endpoint)
                .is_none_or(|at| now.duration_since(*at) >= self.config.retry_interval);
            if is_due {
                attempts.insert(seed.endpoint.clone(), now);
                due.push(seed.clone());
            }
        }
        due
    }

    fn ingest(&self, addrs: &[SocketAddr], src: SocketAddr) -> usize {
        counter!("pex_addrs_received").increment(addrs.len() as u64);
        let added = addrs
            .iter()
            .filter(|addr| self.book.add_address(**addr, Some(src)))
            .count();
        counter!("pex_addrs_added").increment(added as u64);
        added
    }

    async fn send(&self, session: &mut Session, msg: &PexMessage) -> Result<(), PexError> {
        session.send(&msg.encode()?).await?;
        Ok(())
    }

    async fn answer(&self, session: &mut Session, peer: &PeerInfo) -> Result<(), PexError> {
        let own = advertised_addr(peer);
        let addrs: Vec<_> = self
            .book
            .sample(MAX_ADDRS)
            .into_iter()
            .filter(|addr| *addr != own && *addr != peer.remote_addr)
            .collect();
        trace!(%peer, count = addrs.len(), "Serving addresses");
        self.send(session, &PexMessage::Addrs(addrs)).await?;
        counter!("pex_requests_served").increment(1);
        Ok(())
    }

    /// Outbound: request once, store the answer, hang up.
    async fn crawl(&self, session: &mut Session) -> Result<(), PexError> {
        let peer = session.peer().clone();
        self.send(session, &PexMessage::Request).await?;

        let addrs = tokio::time::timeout(self.config.request_timeout, async {
            loop {
                let frame = session.recv().await?.ok_or(PexError::Closed)?;
                match PexMessage::decode(&frame)? {
                    PexMessage::Addrs(addrs) => return Ok::<_, PexError>(addrs),
                    PexMessage::Request => self.answer(session, &peer).await?,
                }
            }
        })
        .await
        .map_err(|_| PexError::Timeout)??;

        let added = self.ingest(&addrs, peer.remote_addr);
        self.book.mark_good(peer.remote_addr);
        debug!(%peer, received = addrs.len(), added, known = self.book.size(), "Crawled peer");
        Ok(())
    }

    /// Inbound: remember the peer, answer one request, hang up.
    ///
    /// Addresses are only taken from peers we asked, so an inbound peer that
    /// pushes `Addrs` is disconnected without any of them being stored.
    async fn serve(&self, session: &mut Session) -> Result<(), PexError> {
        let peer = session.peer().clone();
        let advertised = advertised_addr(&peer);
        if self.book.add_address(advertised, Some(peer.remote_addr)) {
            trace!(%peer, %advertised, "Learned inbound peer address");
        }

        let deadline = tokio::time::sleep(self.config.seed_disconnect_wait);
        tokio::pin!(deadline);

        loop {
            let frame = tokio::select! {
                _ = &mut deadline => {
                    trace!(%peer, "Disconnect wait elapsed");
                    return Ok(());
                }
                frame = session.recv() => frame?,
            };
            let Some(frame) = frame else {
                return Ok(());
            };
            match PexMessage::decode(&frame)? {
                PexMessage::Request => return self.answer(session, &peer).await,
                PexMessage::Addrs(addrs) => {
                    counter!("pex_unsolicited_addrs").increment(1);
                    return Err(PexError::Unsolicited(addrs.len()));
                }
            }
        }
    }
}

/// The peer's advertised listen address, with the observed IP substituted
/// when it advertised an unspecified one.
fn advertised_addr(peer: &PeerInfo) -> SocketAddr {
    if peer.listen_addr.ip().is_unspecified() {
        SocketAddr::new(peer.remote_addr.ip(), peer.listen_addr.port())
    } else {
        peer.listen_addr
    }
}

#[async_trait]
impl<B: AddressStore + 'static> ProtocolHandler for PexService<B> {
    fn channel(&self) -> ChannelId {
        PEX_CHANNEL
    }

    fn dial_candidates(&self, max: usize) -> Vec<PeerAddr> {
        let mut candidates = self.due_seeds(max);
        let remaining = max.saturating_sub(candidates.len());
        if remaining > 0 {
            for addr in self.book.dial_candidates(remaining, self.config.retry_interval) {
                if candidates.iter().any(|c| c.socket_addr() == Some(addr)) {
                    continue;
                }
                candidates.push(PeerAddr::new(addr));
            }
        }
        for addr in candidates.iter().filter_map(PeerAddr::socket_addr) {
            self.book.mark_attempt(addr);
        }
        candidates
    }

    async fn handle_session(&self, mut session: Session) {
        let peer = session.peer().clone();
        let result = match peer.direction {
            Direction::Outbound => self.crawl(&mut session).await,
            Direction::Inbound => self.serve(&mut session).await,
        };
        if let Err(error) = result {
            debug!(%peer, %error, "PEX session failed");
        }
        if let Err(error) = session.close().await {
            trace!(%peer, %error, "Close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_net_addrbook::FileAddressBook;
    use seeder_node_api::{AddressBook, NodeId};

    fn book() -> (tempfile::TempDir, FileAddressBook) {
        let dir = tempfile::tempdir().unwrap();
        let book = FileAddressBook::open(dir.path().join("addrbook.json"), false).unwrap();
        (dir, book)
    }

    fn seed(s: &str) -> PeerAddr {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeds_first_then_retry_interval() {
        let (_dir, book) = book();
        book.add_address("9.9.9.9:26656".parse().unwrap(), None);
        let seeds = vec![seed("1.1.1.1:26656"), seed("2.2.2.2:26656")];
        let pex = PexService::new(book, PexConfig::new(seeds, Duration::from_secs(1)));

        let first: Vec<_> = pex
            .dial_candidates(10)
            .into_iter()
            .map(|c| c.socket_addr().unwrap())
            .collect();
        assert_eq!(
            first,
            vec![
                "1.1.1.1:26656".parse().unwrap(),
                "2.2.2.2:26656".parse().unwrap(),
                "9.9.9.9:26656".parse().unwrap(),
            ]
        );

        // everything was just attempted
        assert!(pex.dial_candidates(10).is_empty());

        tokio::time::advance(DEFAULT_RETRY_INTERVAL).await;
        let again = pex.dial_candidates(1);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].socket_addr(), Some("1.1.1.1:26656".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_candidates_respect_max_and_mark_attempts() {
        let (_dir, book) = book();
        for port in 1..=5 {
            book.add_address(SocketAddr::from(([9, 9, 9, 9], port)), None);
        }
        let pex = PexService::new(book, PexConfig::new(vec![], Duration::from_secs(1)));

        assert_eq!(pex.dial_candidates(3).len(), 3);
        let attempted = (1..=5)
            .filter(|port| {
                pex.book()
                    .get(&SocketAddr::from(([9, 9, 9, 9], *port)))
                    .is_some_and(|k| k.attempts == 1)
            })
            .count();
        assert_eq!(attempted, 3);
        assert_eq!(pex.dial_candidates(10).len(), 2);
        assert_eq!(pex.book().size(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_name_seeds_are_tracked_by_endpoint() {
        let (_dir, book) = book();
        let seeds = vec![seed("seed.example.net:26656"), seed("1.1.1.1:26656")];
        let pex = PexService::new(book, PexConfig::new(seeds.clone(), Duration::from_secs(1)));

        assert_eq!(pex.dial_candidates(10), seeds);
        assert!(pex.dial_candidates(10).is_empty());
        assert_eq!(pex.book().size(), 0);

        tokio::time::advance(DEFAULT_RETRY_INTERVAL).await;
        assert_eq!(pex.dial_candidates(1), vec![seeds[0].clone()]);
    }

    #[test]
    fn test_advertised_addr_substitutes_observed_ip() {
        let mut peer = PeerInfo {
            id: NodeId::new([1; 20].into()),
            remote_addr: "5.6.7.8:40000".parse().unwrap(),
            listen_addr: "0.0.0.0:26656".parse().unwrap(),
            direction: Direction::Inbound,
            moniker: String::new(),
        };
        assert_eq!(advertised_addr(&peer), "5.6.7.8:26656".parse().unwrap());

        peer.listen_addr = "1.2.3.4:26656".parse().unwrap();
        assert_eq!(advertised_addr(&peer), "1.2.3.4:26656".parse().unwrap());
    }
}
