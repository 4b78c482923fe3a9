//! Cross-process notification channel: named publish/subscribe.
//!
//! Any process may publish a payload on a channel; every process holding a
//! [`Subscription`] to that channel receives it, including the publisher.
//! Delivery is at-most-once and ordered only per channel as the broker
//! delivers it. There is no replay of payloads published while a
//! subscriber was disconnected.

pub mod memory;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use memory::InMemoryNotificationChannel;
pub use postgres::PgNotificationChannel;

/// Name of the channel carrying new chat messages.
pub const NOTIFICATION_CHANNEL: &str = "new_message";

/// Largest payload, in bytes, accepted for publishing.
///
/// PostgreSQL rejects `NOTIFY` payloads of 8000 bytes or more in the
/// default configuration; the in-memory channel enforces the same limit.
pub const MAX_PAYLOAD_BYTES: usize = 7999;

/// Publish side and subscription factory of a notification channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync + Debug {
    /// Publishes `payload` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::PayloadTooLarge`] for oversized payloads and
    /// [`NotifyError::Publish`] if the broker could not be reached.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError>;

    /// Opens a subscription that yields every later payload on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Subscribe`] if the subscription could not be
    /// established.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, NotifyError>;
}

/// A live subscription to one channel.
#[async_trait]
pub trait Subscription: Send + Debug {
    /// Waits for the next payload.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::ChannelDisconnected`] once the subscription
    /// has dropped. The subscription must then be discarded and a new one
    /// opened.
    async fn recv(&mut self) -> Result<String, NotifyError>;

    /// Stops listening and releases the underlying connection.
    async fn unsubscribe(self: Box<Self>);
}
