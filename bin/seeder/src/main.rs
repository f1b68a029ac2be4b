//! Seeder node binary.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    seeder_node_commands::run().await
}
