//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::channel::NotificationChannel;
use crate::config::RelayConfig;
use crate::domain::ConnectionRegistry;
use crate::persistence::ChatStore;
use crate::service::MessageService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Holds the one [`ConnectionRegistry`] of this process; the WebSocket
/// handler, the request handlers, and the notification listener all
/// receive the same instance.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connections held by this process.
    pub registry: Arc<ConnectionRegistry>,
    /// Message intake.
    pub message_service: Arc<MessageService>,
    /// Persistence collaborator, for history and connection queries.
    pub store: Arc<dyn ChatStore>,
}

impl AppState {
    /// Wires the registry and message service around the given
    /// collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        channel: Arc<dyn NotificationChannel>,
        config: &RelayConfig,
    ) -> Self {
        let registry = Arc::new(
            ConnectionRegistry::new(Arc::clone(&store), config.send_timeout())
                .with_store_timeout(config.store_timeout()),
        );
        let message_service = Arc::new(
            MessageService::new(Arc::clone(&store), channel, config.publish_timeout())
                .with_store_timeout(config.store_timeout()),
        );
        Self {
            registry,
            message_service,
            store,
        }
    }
}
