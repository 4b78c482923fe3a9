//! In-memory chat store for single-process deployments and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ChatStore, OpenConnection};
use crate::domain::{ConnectionId, MessageRecord};
use crate::error::PersistenceError;

/// Volatile [`ChatStore`]: contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    messages: RwLock<Vec<MessageRecord>>,
    connections: RwLock<Vec<OpenConnection>>,
    next_id: AtomicI64,
}

impl InMemoryChatStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn append(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError> {
        let record = MessageRecord {
            id: self.next_id(),
            username: username.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
        };
        self.messages.write().await.push(record.clone());
        Ok(record)
    }

    async fn register_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        let mut connections = self.connections.write().await;
        if connections.iter().any(|c| &c.connection_id == id) {
            return Err(PersistenceError(format!(
                "connection {id} is already recorded"
            )));
        }
        connections.push(OpenConnection {
            id: self.next_id(),
            connection_id: id.clone(),
        });
        Ok(())
    }

    async fn remove_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        self.connections
            .write()
            .await
            .retain(|c| &c.connection_id != id);
        Ok(())
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        let connections = self.connections.read().await;
        Ok(connections.iter().map(|c| c.connection_id.clone()).collect())
    }

    async fn find_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        let connections = self.connections.read().await;
        Ok(connections.iter().find(|c| &c.connection_id == id).cloned())
    }

    async fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        let messages = self.messages.read().await;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.iter().skip(skip).cloned().collect())
    }
}
