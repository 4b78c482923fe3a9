//! Persistence collaborator: chat history and the open-connection table.
//!
//! [`ChatStore`] is the narrow interface the relay core calls. The
//! PostgreSQL implementation is used in production; the in-memory one
//! backs single-process mode and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ConnectionId, MessageRecord};
use crate::error::PersistenceError;

pub use memory::InMemoryChatStore;
pub use models::OpenConnection;
pub use postgres::PostgresChatStore;

/// Bound on a single store call when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Awaits one store call for at most `limit`.
///
/// # Errors
///
/// Returns the call's own [`PersistenceError`], or one describing the
/// expiry if `limit` elapses first.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, PersistenceError>>,
) -> Result<T, PersistenceError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PersistenceError(format!(
            "store call timed out after {limit:?}"
        ))),
    }
}

/// Durable storage used by the relay.
///
/// Every method is an independent, fallible I/O call. Callers never hold
/// the connection registry lock while awaiting one, and the relay core
/// wraps each write in [`bounded`].
#[async_trait]
pub trait ChatStore: Send + Sync + Debug {
    /// Appends a message and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the write did not complete.
    async fn append(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError>;

    /// Records `id` as an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on database failure or if the id is
    /// already recorded.
    async fn register_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError>;

    /// Removes `id` from the open-connection table. Removing an absent id
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on database failure.
    async fn remove_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError>;

    /// Lists every recorded open connection id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on database failure.
    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError>;

    /// Looks up one recorded connection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on database failure. A missing id is
    /// `Ok(None)`.
    async fn find_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError>;

    /// Returns up to `limit` of the most recent messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on database failure.
    async fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, PersistenceError>;
}
