//! In-process notification channel.
//!
//! [`InMemoryNotificationChannel`] keeps one [`tokio::sync::broadcast`]
//! sender per channel name. Clones share the same senders, so several
//! relay instances inside one process (tests, single-node mode) see each
//! other's payloads exactly like separate processes sharing a broker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use super::{NotificationChannel, Subscription};
use crate::domain::notification::check_payload_size;
use crate::error::NotifyError;

/// Broadcast-backed [`NotificationChannel`].
///
/// When a subscriber's ring buffer is full the oldest payloads are dropped
/// for that subscriber, which matches the at-most-once contract.
#[derive(Debug, Clone)]
pub struct InMemoryNotificationChannel {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl InMemoryNotificationChannel {
    /// Creates a channel hub whose per-channel buffers hold `capacity`
    /// payloads.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drops every sender, disconnecting all current subscriptions.
    ///
    /// Simulates a broker outage: subscribers observe
    /// [`NotifyError::ChannelDisconnected`] and must re-subscribe.
    pub async fn sever(&self) {
        self.channels.lock().await.clear();
    }
}

#[async_trait]
impl NotificationChannel for InMemoryNotificationChannel {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
        check_payload_size(payload)?;
        let channels = self.channels.lock().await;
        if let Some(sender) = channels.get(channel) {
            // No receivers is not an error: nobody is listening.
            let _ = sender.send(payload.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, NotifyError> {
        let mut channels = self.channels.lock().await;
        let receiver = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            receiver,
        }))
    }
}

/// Subscription handed out by [`InMemoryNotificationChannel`].
#[derive(Debug)]
pub struct MemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn recv(&mut self) -> Result<String, NotifyError> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Ok(payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(channel = %self.channel, missed, "subscriber lagged, payloads dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(NotifyError::ChannelDisconnected(format!(
                        "channel {} closed",
                        self.channel
                    )));
                }
            }
        }
    }

    async fn unsubscribe(self: Box<Self>) {
        tracing::debug!(channel = %self.channel, "unsubscribed");
    }
}
