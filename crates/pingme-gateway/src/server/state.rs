//! Gateway state
//!
//! Shared dependencies for the websocket server.

use crate::connection::ConnectionRegistry;
use crate::directory::ConversationDirectory;
use crate::presence::PresenceTracker;
use crate::router::MessageRouter;
use pingme_common::AppConfig;
use pingme_core::IdentityProvider;
use std::sync::Arc;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Per-user live connection index
    registry: Arc<ConnectionRegistry>,
    /// Cached conversation membership
    directory: Arc<ConversationDirectory>,
    /// Presence derived from registry transitions
    presence: Arc<PresenceTracker>,
    /// The dispatch core
    router: Arc<MessageRouter>,
    /// Token verification collaborator
    identity: Arc<dyn IdentityProvider>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<ConversationDirectory>,
        presence: Arc<PresenceTracker>,
        router: Arc<MessageRouter>,
        identity: Arc<dyn IdentityProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            registry,
            directory,
            presence,
            router,
            identity,
            config: Arc::new(config),
        }
    }

    /// Get the connection registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the conversation directory
    #[must_use]
    pub fn directory(&self) -> &Arc<ConversationDirectory> {
        &self.directory
    }

    /// Get the presence tracker
    #[must_use]
    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    /// Get the message router
    #[must_use]
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Get the identity provider
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Get the application configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
