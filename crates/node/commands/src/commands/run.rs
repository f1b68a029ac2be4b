//! Run the seed node until a termination signal arrives.
//!
//! - Resolve and create the data directory
//! - Load configuration from defaults, config file, environment and CLI
//! - Start the metrics endpoint if configured
//! - Load or create the node identity and build the node
//! - Run until SIGINT/SIGTERM, then drain

use crate::{
    cli::Cli,
    config::{EnvOverrides, load_config},
    metrics, signals,
};
use eyre::Result;
use seeder_node_builder::SeedNodeBuilder;
use seeder_node_core::dirs::DataDirs;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the seed node with the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let dirs = DataDirs::new(&cli.datadir)?;
    info!(path = %dirs.root.display(), "Data directory");

    let config_path = dirs.config_file();
    let config = load_config(&config_path, &EnvOverrides::from_env(), &cli.network)?;
    info!(
        chain_id = %config.chain_id,
        seeds = %config.seeds,
        listen = %config.listen_addr,
        max_inbound = config.max_inbound,
        max_outbound = config.max_outbound,
        strict = config.addr_book_strict,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_addr {
        metrics::install_prometheus(addr)?;
        info!(%addr, "Serving metrics");
    }

    let shutdown = CancellationToken::new();
    signals::cancel_on_signal(shutdown.clone())?;

    let mut node = SeedNodeBuilder::load(config, &dirs.root)?.build()?;
    info!("Starting seed node (press Ctrl+C to stop)");
    node.run(shutdown).await?;

    Ok(())
}
