//! Server lifecycle management
//!
//! Binds the HTTP/WebSocket listener and runs it until a shutdown signal
//! (SIGTERM or Ctrl+C) arrives.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use huddle_core::{Config, SignalingCoordinator};

/// Run the HTTP server until shutdown
pub async fn run(config: &Config, coordinator: Arc<SignalingCoordinator>) -> Result<()> {
    let http_address = config.http_address();
    let http_addr: std::net::SocketAddr = http_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

    let router = huddle_api::create_router(coordinator);

    let listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
        error!("Failed to bind HTTP address {}: {}", http_addr, e);
        anyhow::anyhow!("Failed to bind {http_addr}: {e}")
    })?;

    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C, starting graceful shutdown..."); }
        () = terminate => { info!("Received SIGTERM, starting graceful shutdown..."); }
    }
}
