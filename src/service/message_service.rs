//! Message intake: persist first, then publish for fan-out.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::channel::{NOTIFICATION_CHANNEL, NotificationChannel};
use crate::domain::{ConnectionId, MessageRecord, NotificationPayload};
use crate::error::{NotifyError, PersistenceError};
use crate::persistence::{ChatStore, DEFAULT_STORE_TIMEOUT, bounded};

/// Username stored for messages that arrive as frames on a live connection.
pub const CONNECTION_USERNAME: &str = "user";

/// Real-time delivery outcome of a persisted message.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// The payload was handed to the notification channel.
    Published,
    /// Publishing failed; only live fan-out was missed.
    PublishFailed(NotifyError),
}

/// Wire label of a [`Delivery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// See [`Delivery::Published`].
    Published,
    /// See [`Delivery::PublishFailed`].
    PublishFailed,
}

/// Result of a successful intake: the record is durable.
#[derive(Debug, Clone)]
pub struct Submission {
    /// The persisted record.
    pub record: MessageRecord,
    /// Whether the fan-out notification went out.
    pub delivery: Delivery,
}

impl Submission {
    /// Returns `true` if the notification was published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self.delivery, Delivery::Published)
    }

    /// Returns the publish failure, if any.
    #[must_use]
    pub fn notify_error(&self) -> Option<&NotifyError> {
        match &self.delivery {
            Delivery::Published => None,
            Delivery::PublishFailed(e) => Some(e),
        }
    }

    /// Returns the wire label of the delivery outcome.
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        match self.delivery {
            Delivery::Published => DeliveryStatus::Published,
            Delivery::PublishFailed(_) => DeliveryStatus::PublishFailed,
        }
    }
}

/// Entry point for new messages.
///
/// Each submission moves through `Received → Persisted → (Published |
/// PublishFailed)`. The durable write and the notification are separate
/// operations on separate connections: a failed write aborts before
/// anything is published, and a failed publish never undoes the write.
#[derive(Debug, Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
    channel: Arc<dyn NotificationChannel>,
    publish_timeout: Duration,
    store_timeout: Duration,
}

impl MessageService {
    /// Creates a new `MessageService`.
    ///
    /// Store writes use [`DEFAULT_STORE_TIMEOUT`] unless overridden with
    /// [`Self::with_store_timeout`].
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        channel: Arc<dyn NotificationChannel>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channel,
            publish_timeout,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Sets the bound on each durable write.
    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Returns a reference to the inner [`ChatStore`].
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Accepts a message from the request surface.
    ///
    /// The published payload is attributed to `username`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the record could not be stored; in
    /// that case nothing is published.
    pub async fn submit(&self, username: &str, body: &str) -> Result<Submission, PersistenceError> {
        let record = self.persist(username, body).await?;
        let payload = NotificationPayload::from_record(&record);
        let delivery = self.publish(&payload).await;
        Ok(Submission { record, delivery })
    }

    /// Accepts a frame received on a live connection.
    ///
    /// The record is stored under [`CONNECTION_USERNAME`]; the published
    /// payload is attributed to `connection_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the record could not be stored; in
    /// that case nothing is published.
    pub async fn submit_from_connection(
        &self,
        connection_id: &ConnectionId,
        body: &str,
    ) -> Result<Submission, PersistenceError> {
        let record = self.persist(CONNECTION_USERNAME, body).await?;
        let payload = NotificationPayload::from_connection(connection_id.clone(), body);
        let delivery = self.publish(&payload).await;
        Ok(Submission { record, delivery })
    }

    async fn persist(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError> {
        match bounded(self.store_timeout, self.store.append(username, body)).await {
            Ok(record) => {
                tracing::debug!(message_id = record.id, username, "message persisted");
                Ok(record)
            }
            Err(e) => {
                tracing::error!(username, error = %e, "message not persisted, skipping notify");
                Err(e)
            }
        }
    }

    async fn publish(&self, payload: &NotificationPayload) -> Delivery {
        let outcome = match payload.encode() {
            Ok(wire) => {
                let publish = self.channel.publish(NOTIFICATION_CHANNEL, &wire);
                match tokio::time::timeout(self.publish_timeout, publish).await {
                    Ok(result) => result,
                    Err(_) => Err(NotifyError::TimedOut(self.publish_timeout)),
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Delivery::Published,
            Err(e) => {
                tracing::warn!(channel = NOTIFICATION_CHANNEL, error = %e, "notification not published");
                Delivery::PublishFailed(e)
            }
        }
    }
}
