//! Open-connection inspection DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// Response body for `GET /connections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Connection ids recorded as open, across all relay processes.
    pub connections: Vec<ConnectionId>,
    /// Number of recorded connections.
    pub total: usize,
}
