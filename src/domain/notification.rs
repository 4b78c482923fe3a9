//! Notification payload: the transient envelope used for fan-out.
//!
//! A [`NotificationPayload`] is a projection of a message built only for
//! real-time delivery. It is serialized as a flat JSON object, either
//!
//! ```json
//! {"username": "alice", "body": "hi"}
//! ```
//!
//! for messages submitted through the request surface, or
//!
//! ```json
//! {"connection_id": "4f0c…", "body": "hi"}
//! ```
//!
//! for frames that arrived on a live connection. Serialization goes through
//! `serde_json`, so user text is always escaped by the serializer and never
//! spliced into a channel command.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, MessageRecord};
use crate::channel::MAX_PAYLOAD_BYTES;
use crate::error::NotifyError;

/// Who a payload is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Origin {
    /// Submitted through the request surface under a username.
    User {
        /// Author name.
        username: String,
    },
    /// Sent as a frame on a live connection.
    Connection {
        /// Originating connection.
        connection_id: ConnectionId,
    },
}

/// Envelope published on the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Attribution of the message.
    #[serde(flatten)]
    pub origin: Origin,
    /// Message text.
    pub body: String,
}

impl NotificationPayload {
    /// Builds a payload attributed to the record's username.
    #[must_use]
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            origin: Origin::User {
                username: record.username.clone(),
            },
            body: record.body.clone(),
        }
    }

    /// Builds a payload attributed to a live connection.
    #[must_use]
    pub fn from_connection(connection_id: ConnectionId, body: impl Into<String>) -> Self {
        Self {
            origin: Origin::Connection { connection_id },
            body: body.into(),
        }
    }

    /// Returns the username, if the payload is user-attributed.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.origin {
            Origin::User { username } => Some(username),
            Origin::Connection { .. } => None,
        }
    }

    /// Serializes the payload for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::PayloadTooLarge`] if the encoded form exceeds
    /// [`MAX_PAYLOAD_BYTES`], or [`NotifyError::Encode`] if serialization
    /// fails.
    pub fn encode(&self) -> Result<String, NotifyError> {
        let encoded =
            serde_json::to_string(self).map_err(|e| NotifyError::Encode(e.to_string()))?;
        check_payload_size(&encoded)?;
        Ok(encoded)
    }

    /// Parses a payload received from the channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Decode`] if the text is not a valid envelope.
    pub fn decode(raw: &str) -> Result<Self, NotifyError> {
        serde_json::from_str(raw).map_err(|e| NotifyError::Decode(e.to_string()))
    }
}

/// Rejects payloads the channel would refuse to deliver.
///
/// # Errors
///
/// Returns [`NotifyError::PayloadTooLarge`] when `payload` is longer than
/// [`MAX_PAYLOAD_BYTES`].
pub fn check_payload_size(payload: &str) -> Result<(), NotifyError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(NotifyError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(())
}
