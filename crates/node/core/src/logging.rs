//! Logging configuration for the seeder.

use crate::args::LogArgs;
use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or a level from `-v`
/// 3. Apply any custom filter from `--log.filter`
///
/// Only the binary calls this. Libraries and tests never install a global
/// subscriber.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = build_filter(args, std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if args.json {
        builder.json().try_init().map_err(|e| eyre!(e))
    } else {
        builder.try_init().map_err(|e| eyre!(e))
    }
}

/// Build the filter from args and the value of `RUST_LOG`, if any.
pub fn build_filter(args: &LogArgs, rust_log: Option<&str>) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(base_level));

    // Add any custom filter directives
    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            if let Ok(d) = directive.trim().parse() {
                filter = filter.add_directive(d);
            }
        }
    }

    filter
}
