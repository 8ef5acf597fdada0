//! PingMe gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p pingme-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use pingme_common::{try_init_tracing, AppConfig, JwtAuthenticator};
use pingme_gateway::store::MemoryStore;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting PingMe gateway...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        "Configuration loaded"
    );

    let identity = Arc::new(JwtAuthenticator::new(
        &config.jwt.secret,
        config.jwt.token_expiry,
    ));

    // Standalone mode runs against the in-process store; deployments with a
    // durable backend call `server::run` with their own collaborator.
    let store = Arc::new(MemoryStore::new());
    info!("Using in-process memory store");

    pingme_gateway::server::run(config, store, identity).await?;

    Ok(())
}
