//! Seed node orchestration.
//!
//! [`Orchestrator`] owns the lifecycle of a seed node and is generic over the
//! capability traits in `seeder-node-api`, so its sequencing can be tested
//! with stubs. [`SeedNodeBuilder`] wires it to the TCP transport, the switch,
//! the file-backed address book and the PEX service.
//!
//! # Example
//!
//! ```ignore
//! use seeder_node_builder::SeedNodeBuilder;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut node = SeedNodeBuilder::load(config, &data_dir)?.build()?;
//! node.run(CancellationToken::new()).await?;
//! ```

mod builder;
mod orchestrator;

pub use builder::{SeedNode, SeedNodeBuilder};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, State};
