//! Seeder node infrastructure library.
//!
//! This crate provides the pieces of the seeder that do not touch the network:
//! - [`args`] - CLI argument structs
//! - [`config`] - The [`SeedConfig`](config::SeedConfig) shape and defaults
//! - [`dirs`] - Data directory management
//! - [`identity`] - Load-or-generate of the persistent [`NodeKey`](identity::NodeKey)
//! - [`logging`] - Logging initialization
//! - [`version`] - Version information
//!
//! For wiring the network stack, see `seeder-node-builder`.

pub mod args;
pub mod config;
pub mod constants;
pub mod dirs;
pub mod identity;
pub mod logging;
pub mod version;
