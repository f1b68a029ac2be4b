//! Assembly of the concrete seed node stack.
//!
//! ```text
//! SeedConfig + NodeKey
//!   │
//!   ├── parse listen address and seeds
//!   ├── NodeDescriptor
//!   ├── TcpTransport           (not bound yet)
//!   ├── FileAddressBook        (loaded from disk, empty if missing)
//!   ├── PexService             (seed mode, shares the book)
//!   ├── Switch                 (caps, duplicate IPs allowed, PEX as handler)
//!   ▼
//! SeedNode = Orchestrator<Arc<TcpTransport>, Switch, Arc<FileAddressBook>>
//! ```

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use seeder_net_addrbook::FileAddressBook;
use seeder_net_pex::{PexConfig, PexService};
use seeder_net_switch::{Switch, SwitchConfig, TcpTransport};
use seeder_node_api::{NodeDescriptor, PEX_CHANNEL};
use seeder_node_core::{
    config::SeedConfig, constants::PROTOCOL_VERSION, identity::NodeKey, version::NODE_VERSION,
};
use tracing::{Span, debug};

use crate::{Orchestrator, OrchestratorConfig, OrchestratorError};

/// The orchestrator wired to the TCP stack.
pub type SeedNode = Orchestrator<Arc<TcpTransport>, Switch, Arc<FileAddressBook>>;

/// Builds a [`SeedNode`] from configuration and identity.
///
/// Relative file paths in the config are resolved against the data
/// directory, which defaults to the working directory.
#[derive(Debug)]
pub struct SeedNodeBuilder {
    config: SeedConfig,
    identity: NodeKey,
    data_dir: PathBuf,
    span: Option<Span>,
}

impl SeedNodeBuilder {
    pub fn new(config: SeedConfig, identity: NodeKey) -> Self {
        Self {
            config,
            identity,
            data_dir: PathBuf::new(),
            span: None,
        }
    }

    /// Load or create the node key configured for `data_dir` and start a builder.
    pub fn load(config: SeedConfig, data_dir: impl Into<PathBuf>) -> Result<Self, OrchestratorError> {
        let data_dir = data_dir.into();
        let identity = NodeKey::load_or_generate(&config.node_key_path(&data_dir))?;
        Ok(Self::new(config, identity).with_data_dir(data_dir))
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Instrument the node with `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub fn identity(&self) -> &NodeKey {
        &self.identity
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Descriptor advertised by this node when listening on `listen_addr`.
    pub fn descriptor(&self, listen_addr: SocketAddr) -> NodeDescriptor {
        NodeDescriptor {
            node_id: self.identity.node_id(),
            network: self.config.chain_id.clone(),
            protocol: PROTOCOL_VERSION,
            listen_addr,
            channels: vec![PEX_CHANNEL],
            moniker: self.config.moniker(),
            version: NODE_VERSION.to_string(),
        }
    }

    /// Construct every component. Opens the address book but no sockets.
    pub fn build(self) -> Result<SeedNode, OrchestratorError> {
        let config = &self.config;

        let listen_addr = config.listen_socket_addr()?;
        let seeds = config.seed_addrs()?;

        let descriptor = self.descriptor(listen_addr);
        let transport = Arc::new(TcpTransport::new(descriptor.clone()));

        let book_path = config.addr_book_path(&self.data_dir);
        let book = FileAddressBook::open(&book_path, config.addr_book_strict).map_err(|err| {
            OrchestratorError::AddressBookOpen {
                path: book_path.clone(),
                source: Box::new(err),
            }
        })?;
        let book = Arc::new(book);
        debug!(path = %book_path.display(), strict = config.addr_book_strict, "Address book opened");

        let pex = Arc::new(PexService::new(
            book.clone(),
            PexConfig::new(seeds, config.seed_disconnect_wait()),
        ));

        let switch = Switch::new(
            transport.clone(),
            pex,
            SwitchConfig {
                max_inbound: config.max_inbound,
                max_outbound: config.max_outbound,
                allow_duplicate_ip: true,
                dial_interval: config.dial_interval(),
            },
        );

        let node = Orchestrator::from_parts(
            descriptor,
            listen_addr,
            transport,
            switch,
            book,
            OrchestratorConfig::from(config),
        );
        Ok(match self.span {
            Some(span) => node.with_span(span),
            None => node,
        })
    }
}
