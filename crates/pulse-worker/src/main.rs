//! Pulse Worker - Main entry point

use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use pulse_common::logging::{init_logging, LogConfig};
use tokio::signal;
use tracing::info;

use pulse_worker::{api, config::Config, context::AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::from_env()?.with_default_targets(&["pulse_worker", "tower_http"]);
    init_logging(&log_config)?;

    info!("Starting Pulse Worker");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        service = %config.service_name,
        "Configuration loaded"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shutdown_timeout_secs = config.server.shutdown_timeout_secs;

    let ctx = AppContext::from_config(config)?;
    let app = api::router(ctx);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let grace = Duration::from_secs(shutdown_timeout_secs);
    api::serve(listener, app, shutdown_signal(), grace).await?;

    info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
