//! Prometheus exporter.

use eyre::{Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the global Prometheus recorder and serve it over HTTP on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .wrap_err_with(|| format!("Failed to start metrics endpoint on {addr}"))
}
