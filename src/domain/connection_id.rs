//! Type-safe connection identifier.
//!
//! [`ConnectionId`] is a newtype wrapper around a `String` so that
//! connection identifiers cannot be confused with usernames or message
//! bodies. Ids are generated by the transport surface; the registry only
//! requires them to be unique within the process.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of one live transport connection.
///
/// Used as the key in [`super::ConnectionRegistry`], as the value stored in
/// the durable open-connection table, and as the origin marker of
/// notification payloads sent from a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4, hyphenated).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}
