//! Gateway server setup
//!
//! Wires the delivery core together and exposes the connection accept
//! entry point to the surrounding application.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use crate::connection::ConnectionRegistry;
use crate::directory::ConversationDirectory;
use crate::presence::PresenceTracker;
use crate::router::MessageRouter;
use axum::{routing::get, Router};
use pingme_common::{AppConfig, AppError};
use pingme_core::{DurableStore, IdentityProvider};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(gateway_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the delivery core against the supplied collaborators.
///
/// Starts the presence tracker task as a side effect.
pub fn build_state(
    config: AppConfig,
    store: Arc<dyn DurableStore>,
    identity: Arc<dyn IdentityProvider>,
) -> GatewayState {
    let registry = ConnectionRegistry::new_shared();
    let directory = Arc::new(ConversationDirectory::new(
        Arc::clone(&store),
        Duration::from_secs(config.directory.participant_ttl_secs),
    ));

    let presence = PresenceTracker::new(
        Arc::clone(&registry),
        Arc::clone(&directory),
        Arc::clone(&store),
    );
    let _presence_task = presence.start();

    let router = Arc::new(MessageRouter::new(
        Arc::clone(&registry),
        Arc::clone(&directory),
        store,
    ));

    GatewayState::new(registry, directory, presence, router, identity, config)
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Server(format!("Server error: {e}")))?;

    Ok(())
}

/// The connection accept entry point: run the complete gateway against the
/// supplied collaborators.
pub async fn run(
    config: AppConfig,
    store: Arc<dyn DurableStore>,
    identity: Arc<dyn IdentityProvider>,
) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid gateway address: {e}")))?;

    let state = build_state(config, store, identity);
    let app = create_app(state);

    run_server(app, addr).await
}
