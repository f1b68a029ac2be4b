//! Termination signal handling.

use eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `token` on the first SIGINT or SIGTERM (ctrl-c outside unix).
///
/// Handlers are registered before this returns, so registration failures
/// surface here rather than in the background task.
pub fn cancel_on_signal(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt =
            signal(SignalKind::interrupt()).wrap_err("Failed to install SIGINT handler")?;
        let mut terminate =
            signal(SignalKind::terminate()).wrap_err("Failed to install SIGTERM handler")?;

        tokio::spawn(async move {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            info!(signal = name, "Received shutdown signal");
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(error) => tracing::error!(%error, "Failed to listen for ctrl-c"),
            }
            token.cancel();
        });
    }

    Ok(())
}
