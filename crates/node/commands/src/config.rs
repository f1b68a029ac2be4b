//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (`--chain-id`, `--seeds`, `--listen-addr`, `--metrics`)
//! 2. Environment variables (`CHAIN`, `SEEDS`)
//! 3. Config file (`config.toml` in the data directory)
//! 4. Defaults

use eyre::{Result, WrapErr};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use seeder_node_core::{args::NetworkArgs, config::SeedConfig};
use serde::Serialize;
use std::path::Path;

/// Environment variable holding the network identifier.
pub const CHAIN_ENV: &str = "CHAIN";

/// Environment variable holding the seed list.
pub const SEEDS_ENV: &str = "SEEDS";

/// Values taken from the environment. Empty variables count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            chain_id: get(CHAIN_ENV),
            seeds: get(SEEDS_ENV),
        }
    }

    /// Read the overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Layer defaults, the config file at `path`, the environment and the CLI,
/// then validate the result.
///
/// A missing file is skipped. A malformed file or an unparseable address is an error.
pub fn load_config(path: &Path, env: &EnvOverrides, cli: &NetworkArgs) -> Result<SeedConfig> {
    let mut figment = Figment::new().merge(Serialized::defaults(SeedConfig::default()));

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }

    let config: SeedConfig = figment
        .merge(Serialized::defaults(env))
        .merge(Serialized::defaults(cli))
        .extract()
        .wrap_err_with(|| format!("Failed to load configuration from {}", path.display()))?;

    config.validate().wrap_err("Invalid configuration")?;
    Ok(config)
}
