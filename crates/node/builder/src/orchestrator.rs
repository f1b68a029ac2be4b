//! Seed node lifecycle.
//!
//! ```text
//! Created ──listen──► Listening ──start──► Running ──cancel──► Draining ──► Stopped
//!    │                    │                                                   ▲
//!    └── bind error ──────┴── start error (transport closed) ─────────────────┘
//! ```
//!
//! The supervisory loop is the only place that saves the address book or
//! stops the connection manager, so shutdown needs no locking of its own.

use std::{fmt, net::SocketAddr, path::PathBuf, time::Duration};

use metrics::gauge;
use seeder_node_api::{AddressBook, AddressParseError, ConnectionManager, NodeDescriptor, Transport};
use seeder_node_core::{config::SeedConfig, identity::IdentityError};
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// Shortest supervisory period accepted; a zero interval would spin.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Lifecycle state of an [`Orchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Listening,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("invalid address: {0}")]
    AddressParse(#[from] AddressParseError),
    #[error("failed to open address book {}: {source}", .path.display())]
    AddressBookOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: BoxError,
    },
    #[error("failed to start connection manager: {0}")]
    ManagerStart(#[source] BoxError),
    #[error("failed to save address book: {0}")]
    Save(#[source] BoxError),
    #[error("failed to stop connection manager: {0}")]
    Stop(#[source] BoxError),
    #[error("connection manager did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("failed to close transport: {0}")]
    Close(#[source] BoxError),
    #[error("cannot run an orchestrator in state {0}")]
    InvalidState(State),
}

/// Supervisory loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Period of the status tick. The first tick fires one period after start.
    pub tick_interval: Duration,
    /// Save the address book on every tick, not only at shutdown.
    pub persist_on_tick: bool,
    /// Deadline for stopping the connection manager during drain.
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&SeedConfig::default())
    }
}

impl From<&SeedConfig> for OrchestratorConfig {
    fn from(config: &SeedConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            persist_on_tick: config.persist_on_tick,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Composes a transport, a connection manager and an address book into a
/// running seed node.
///
/// Construction performs no I/O. Everything network related happens in
/// [`run`](Self::run), which may be called once.
pub struct Orchestrator<T, M, B> {
    descriptor: NodeDescriptor,
    listen_addr: SocketAddr,
    transport: T,
    manager: M,
    book: B,
    config: OrchestratorConfig,
    state: State,
    span: Span,
}

impl<T, M, B> fmt::Debug for Orchestrator<T, M, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("node_id", &self.descriptor.node_id)
            .field("network", &self.descriptor.network)
            .field("listen_addr", &self.listen_addr)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, M, B> Orchestrator<T, M, B>
where
    T: Transport,
    M: ConnectionManager,
    B: AddressBook,
{
    pub fn from_parts(
        descriptor: NodeDescriptor,
        listen_addr: SocketAddr,
        transport: T,
        manager: M,
        book: B,
        config: OrchestratorConfig,
    ) -> Self {
        let span = info_span!(
            "seeder",
            node_id = %descriptor.node_id,
            network = %descriptor.network,
        );
        info!(
            node_id = %descriptor.node_id,
            network = %descriptor.network,
            %listen_addr,
            moniker = %descriptor.moniker,
            known_addresses = book.size(),
            "Seed node configured"
        );

        Self {
            descriptor,
            listen_addr,
            transport,
            manager,
            book,
            config,
            state: State::Created,
            span,
        }
    }

    /// Replace the span `run` is instrumented with.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The advertised descriptor. After `run` binds, `listen_addr` is the bound address.
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn address_book(&self) -> &B {
        &self.book
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Bind, start, supervise until `shutdown` fires, then drain.
    ///
    /// Returns [`OrchestratorError::InvalidState`] unless the orchestrator is
    /// still in [`State::Created`]. On return the state is always
    /// [`State::Stopped`].
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), OrchestratorError> {
        let span = self.span.clone();
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner(&mut self, shutdown: CancellationToken) -> Result<(), OrchestratorError> {
        if self.state != State::Created {
            return Err(OrchestratorError::InvalidState(self.state));
        }

        let bound = match self.transport.listen(self.listen_addr).await {
            Ok(bound) => bound,
            Err(err) => {
                error!(addr = %self.listen_addr, error = %err, "Failed to bind");
                self.transition(State::Stopped);
                return Err(OrchestratorError::Bind {
                    addr: self.listen_addr,
                    source: Box::new(err),
                });
            }
        };
        self.descriptor.listen_addr = bound;
        info!(%bound, "Listening");
        self.transition(State::Listening);

        if let Err(err) = self.manager.start() {
            error!(error = %err, "Failed to start connection manager");
            if let Err(close) = self.transport.close() {
                warn!(error = %close, "Failed to close transport");
            }
            self.transition(State::Stopped);
            return Err(OrchestratorError::ManagerStart(Box::new(err)));
        }
        self.transition(State::Running);

        self.supervise(&shutdown).await;
        self.drain().await
    }

    async fn supervise(&self, shutdown: &CancellationToken) {
        let period = self.config.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => self.tick(),
            }
        }
    }

    fn tick(&self) {
        let peers = self.manager.peers();
        let known = self.book.size();

        gauge!("seeder_connected_peers").set(peers.len() as f64);
        gauge!("seeder_known_addresses").set(known as f64);

        info!(peers = peers.len(), known, "Status");
        if !peers.is_empty() {
            let list: Vec<String> = peers.iter().map(ToString::to_string).collect();
            debug!(peers = ?list, "Connected peers");
        }

        if self.config.persist_on_tick
            && let Err(err) = self.book.save()
        {
            warn!(error = %err, "Failed to save address book");
        }
    }

    /// Save, stop, close. Each step runs even if an earlier one failed; the
    /// first failure is returned.
    async fn drain(&mut self) -> Result<(), OrchestratorError> {
        self.transition(State::Draining);
        let mut first_error = None;

        info!(known = self.book.size(), "Saving address book");
        if let Err(err) = self.book.save() {
            error!(error = %err, "Failed to save address book");
            first_error.get_or_insert(OrchestratorError::Save(Box::new(err)));
        }

        info!("Stopping connection manager");
        match tokio::time::timeout(self.config.shutdown_timeout, self.manager.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(error = %err, "Failed to stop connection manager");
                first_error.get_or_insert(OrchestratorError::Stop(Box::new(err)));
            }
            Err(_) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "Connection manager did not stop in time, tearing down the transport regardless"
                );
                first_error.get_or_insert(OrchestratorError::ShutdownTimeout(
                    self.config.shutdown_timeout,
                ));
            }
        }

        info!("Closing transport");
        if let Err(err) = self.transport.close() {
            error!(error = %err, "Failed to close transport");
            first_error.get_or_insert(OrchestratorError::Close(Box::new(err)));
        }

        self.transition(State::Stopped);
        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Seed node stopped");
                Ok(())
            }
        }
    }

    fn transition(&mut self, to: State) {
        debug!(from = %self.state, %to, "State transition");
        self.state = to;
    }
}
