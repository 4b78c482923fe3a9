//! Message submission and history DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::MessageRecord;
use crate::service::{DeliveryStatus, Submission};

/// Default number of messages returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Largest accepted history `limit`.
pub const MAX_HISTORY_LIMIT: u32 = 500;

/// Request body for `POST /messages`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    /// Author name.
    pub username: String,
    /// Message text. Also accepted as `message`.
    #[serde(alias = "message")]
    pub body: String,
}

/// Response body for `POST /messages`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Store-assigned row ID.
    pub id: i64,
    /// Author name.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Persistence timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the real-time notification went out.
    pub delivery: DeliveryStatus,
    /// Publish failure description, when `delivery` is `publish_failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_error: Option<String>,
}

impl From<Submission> for MessageResponse {
    fn from(submission: Submission) -> Self {
        let delivery = submission.delivery_status();
        let notify_error = submission.notify_error().map(ToString::to_string);
        let MessageRecord {
            id,
            username,
            body,
            timestamp,
        } = submission.record;
        Self {
            id,
            username,
            body,
            timestamp,
            delivery,
            notify_error,
        }
    }
}

/// Query parameters for `GET /messages`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Number of most recent messages to return (max 500). Defaults to 50.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

impl HistoryParams {
    /// Clamps `limit` to `1..=MAX_HISTORY_LIMIT`.
    #[must_use]
    pub fn clamped_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_HISTORY_LIMIT)
    }
}

/// Response body for `GET /messages`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Messages, oldest first.
    pub messages: Vec<MessageRecord>,
}
