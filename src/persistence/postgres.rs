//! PostgreSQL implementation of the persistence layer.
//!
//! Expects the following schema to exist (provisioning is handled outside
//! this service):
//!
//! ```sql
//! CREATE TABLE chat_messages (
//!     id        BIGSERIAL PRIMARY KEY,
//!     username  TEXT NOT NULL,
//!     message   TEXT NOT NULL,
//!     timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! CREATE TABLE websocket_connections (
//!     id            BIGSERIAL PRIMARY KEY,
//!     connection_id TEXT NOT NULL UNIQUE
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ChatStore, OpenConnection};
use crate::domain::{ConnectionId, MessageRecord};
use crate::error::PersistenceError;

type MessageRow = (i64, String, String, DateTime<Utc>);

/// PostgreSQL-backed chat store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresChatStore {
    pool: PgPool,
}

impl PostgresChatStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_record((id, username, body, timestamp): MessageRow) -> MessageRecord {
    MessageRecord {
        id,
        username,
        body,
        timestamp,
    }
}

#[async_trait]
impl ChatStore for PostgresChatStore {
    async fn append(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO chat_messages (username, message) VALUES ($1, $2) \
             RETURNING id, username, message, timestamp",
        )
        .bind(username)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(into_record(row))
    }

    async fn register_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO websocket_connections (connection_id) VALUES ($1)")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM websocket_connections WHERE connection_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT connection_id FROM websocket_connections ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConnectionId::from).collect())
    }

    async fn find_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, connection_id FROM websocket_connections WHERE connection_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, connection_id)| OpenConnection {
            id,
            connection_id: ConnectionId::from(connection_id),
        }))
    }

    async fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        let mut rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, username, message, timestamp FROM chat_messages \
             ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();
        Ok(rows.into_iter().map(into_record).collect())
    }
}
