//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the optional metrics exporter
//! - Bind the listener and run the HTTP server until shutdown
//!
//! # Design Decisions
//! - A metrics exporter failure is logged and ignored; request logging does not
//!   depend on it
//! - Bind and serve failures are returned so the binary can log them on the
//!   error channel and exit

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::LoggerdConfig;
use crate::http::HttpServer;
use crate::observability::{metrics, Loggers};

/// Error that stops the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind `listener.bind_address` and serve until `shutdown` fires.
pub async fn serve(
    config: LoggerdConfig,
    loggers: Arc<Loggers>,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::warn!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::warn!(metrics_address = %addr, error = %e, "Invalid metrics address"),
        }
    }

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    HttpServer::new(config, loggers)
        .run(listener, shutdown)
        .await
        .map_err(StartupError::Serve)
}
