//! Transport handle abstraction owned by the connection registry.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::TransportSendError;

/// Write side of one live bidirectional connection.
///
/// A handle is moved into [`super::ConnectionRegistry`] on connect and is
/// owned exclusively by it from then on: no other component sends on it or
/// closes it. Implementations must not buffer unboundedly; the registry
/// bounds every call with its own timeout.
#[async_trait]
pub trait ClientSink: Send + Debug {
    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportSendError`] when the frame could not be
    /// written; the registry then treats the connection as dead.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportSendError>;

    /// Closes the connection. Must tolerate being called on an already
    /// severed transport.
    async fn close(&mut self);
}
