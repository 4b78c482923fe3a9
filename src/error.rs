//! Relay error types with HTTP status code mapping.
//!
//! Each failure class of the relay has its own type so that callers can
//! tell a failed durable write apart from a missed real-time fan-out:
//!
//! - [`PersistenceError`]: the durable write failed; nothing was published.
//! - [`NotifyError`]: publish/subscribe on the notification channel failed;
//!   durable effects still stand.
//! - [`DuplicateConnectionError`]: a connection id collided locally.
//! - [`TransportSendError`]: one handle failed during fan-out.
//!
//! [`RelayError`] aggregates them for the request surface and maps each
//! variant to an HTTP status code and structured JSON error response.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// Structured JSON error response body.
///
/// All error responses (HTTP bodies and WebSocket error frames) follow
/// this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "persistence error: connection refused",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A durable write or query against the persistence collaborator failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("persistence error: {0}")]
pub struct PersistenceError(pub String);

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Failure on the notification channel.
///
/// Never fatal to a submitted message: the record is already durable when
/// any of these is reported.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// Publishing a payload failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Subscribing to a channel failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The encoded payload exceeds the channel's delivery limit.
    #[error("payload of {size} bytes exceeds channel limit of {limit} bytes")]
    PayloadTooLarge {
        /// Encoded payload size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        limit: usize,
    },

    /// The payload could not be serialized.
    #[error("payload encoding failed: {0}")]
    Encode(String),

    /// A received payload could not be parsed.
    #[error("payload decoding failed: {0}")]
    Decode(String),

    /// The publish call did not complete in time.
    #[error("publish timed out after {0:?}")]
    TimedOut(Duration),

    /// The subscription to the channel dropped.
    #[error("notification channel disconnected: {0}")]
    ChannelDisconnected(String),
}

/// A connection id is already registered in this process.
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection {0} is already registered")]
pub struct DuplicateConnectionError(pub ConnectionId);

/// Delivery to a single transport handle failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportSendError {
    /// The handle is closed or no longer registered.
    #[error("transport closed")]
    Closed,

    /// The send did not complete within the per-send bound.
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),

    /// The transport reported an I/O failure.
    #[error("send failed: {0}")]
    Failed(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 / 502 / 504              |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection id not present in the open-connection table.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Connection id collided with a live local connection.
    #[error(transparent)]
    DuplicateConnection(#[from] DuplicateConnectionError),

    /// Persistence layer failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Notification channel failure.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::ConnectionNotFound(_) => 2001,
            Self::DuplicateConnection(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Notify(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateConnection(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Notify(NotifyError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Notify(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Builds the structured body shared by HTTP responses and WebSocket
    /// error frames.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = axum::Json(self.to_error_response()).into_response();
        *response.status_mut() = status;
        response
    }
}
