//! PostgreSQL `LISTEN`/`NOTIFY` notification channel.
//!
//! Publishing goes through `pg_notify` with bound parameters on a pool
//! reserved for notifications, separate from the pool the chat store
//! writes through. Each subscription owns a dedicated [`PgListener`]
//! connection.

use std::fmt;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;

use super::{NotificationChannel, Subscription};
use crate::domain::notification::check_payload_size;
use crate::error::NotifyError;

/// [`NotificationChannel`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgNotificationChannel {
    pool: PgPool,
}

impl PgNotificationChannel {
    /// Creates a channel publishing through `pool`.
    ///
    /// Subscriptions open their own connections using the pool's connect
    /// options.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationChannel for PgNotificationChannel {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
        check_payload_size(payload)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, NotifyError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| NotifyError::Subscribe(e.to_string()))?;
        listener
            .listen(channel)
            .await
            .map_err(|e| NotifyError::Subscribe(e.to_string()))?;

        tracing::info!(channel, "listening for notifications");
        Ok(Box::new(PgSubscription {
            channel: channel.to_string(),
            listener,
        }))
    }
}

/// Subscription holding a dedicated `LISTEN` connection.
pub struct PgSubscription {
    channel: String,
    listener: PgListener,
}

impl fmt::Debug for PgSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSubscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Subscription for PgSubscription {
    async fn recv(&mut self) -> Result<String, NotifyError> {
        // `try_recv` yields `None` when the connection was lost; anything
        // sent before the listener reconnects is gone, so report it.
        match self.listener.try_recv().await {
            Ok(Some(notification)) => Ok(notification.payload().to_string()),
            Ok(None) => Err(NotifyError::ChannelDisconnected(format!(
                "listen connection for {} lost",
                self.channel
            ))),
            Err(e) => Err(NotifyError::ChannelDisconnected(e.to_string())),
        }
    }

    async fn unsubscribe(mut self: Box<Self>) {
        if let Err(e) = self.listener.unlisten(&self.channel).await {
            tracing::warn!(channel = %self.channel, error = %e, "unlisten failed");
        }
        tracing::debug!(channel = %self.channel, "unsubscribed");
    }
}
