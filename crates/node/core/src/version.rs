//! Version information for the seeder.

use std::sync::LazyLock;

/// The version string from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The git commit SHA (set by build.rs if available).
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// The build timestamp (set by build.rs if available).
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// The cargo features (set by build.rs if available).
pub const CARGO_FEATURES: &str = match option_env!("VERGEN_CARGO_FEATURES") {
    Some(f) => f,
    None => "default",
};

/// Multi-line version shown by `--version`.
pub static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "Version: {VERSION}\nCommit SHA: {GIT_SHA}\nBuild Timestamp: {BUILD_TIMESTAMP}\nFeatures: {CARGO_FEATURES}"
    )
});

/// Software version advertised in the node descriptor.
pub const NODE_VERSION: &str = env!("CARGO_PKG_VERSION");
