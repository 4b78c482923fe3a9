//! Durable chat message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A chat message as stored by the persistence collaborator.
///
/// Immutable once persisted: the timestamp is assigned by the store at
/// append time and the relay never rewrites a record afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageRecord {
    /// Store-assigned row ID.
    pub id: i64,
    /// Author name supplied by the caller.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Persistence timestamp.
    pub timestamp: DateTime<Utc>,
}
