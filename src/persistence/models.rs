//! Database models for the open-connection table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// A row of the `websocket_connections` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OpenConnection {
    /// Auto-increment row ID.
    pub id: i64,
    /// Recorded connection identifier.
    pub connection_id: ConnectionId,
}
