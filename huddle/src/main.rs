mod server;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use huddle_core::{load_config, logging, LoopbackEngine, SessionRegistry, SignalingCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("huddle signaling server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Construct the capability gateway.
    //
    // Standalone mode runs against the in-process loopback engine; a real
    // media engine binding implements the same `MediaEngine` traits and is
    // wired in here.
    let engine = Arc::new(LoopbackEngine::new());
    info!("Media engine: loopback (standalone mode)");

    // 4. Session registry + background room cleanup
    let config = Arc::new(config);
    let registry = SessionRegistry::new(engine, Arc::clone(&config));
    let _cleanup_task = Arc::clone(&registry).spawn_cleanup_task();

    // 5. Signaling coordinator
    let coordinator = Arc::new(SignalingCoordinator::new(registry));

    // 6. Serve until shutdown
    server::run(&config, coordinator).await
}
