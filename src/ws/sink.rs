//! [`ClientSink`] over the write half of an axum WebSocket.

use std::fmt;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;

use crate::domain::ClientSink;
use crate::error::TransportSendError;

/// Write half of one WebSocket, owned by the connection registry.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    /// Wraps the write half produced by `WebSocket::split`.
    #[must_use]
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for WsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl ClientSink for WsSink {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportSendError> {
        self.inner
            .send(Message::text(text))
            .await
            .map_err(|e| TransportSendError::Failed(e.to_string()))
    }

    async fn close(&mut self) {
        // The peer may already be gone; a failed close frame changes nothing.
        let _ = self.inner.send(Message::Close(None)).await;
        let _ = self.inner.close().await;
    }
}
