//! CLI argument structs for the seeder.
//!
//! These args serve dual purposes:
//! - CLI parsing via clap (`#[derive(Args)]`)
//! - Configuration layering via serde (`#[derive(Serialize, Deserialize)]`)

mod datadir;
mod log;
mod network;

pub use datadir::DataDirArgs;
pub use log::LogArgs;
pub use network::NetworkArgs;
