//! Domain layer: connection identity, message records, the notification
//! envelope, and the live connection registry.
//!
//! The [`ConnectionRegistry`] is the single owner of the transport handles
//! held by this process. Everything else in the crate talks to it through
//! a shared reference.

pub mod client_sink;
pub mod connection_id;
pub mod connection_registry;
pub mod message_record;
pub mod notification;

pub use client_sink::ClientSink;
pub use connection_id::ConnectionId;
pub use connection_registry::{BroadcastReport, ConnectionRegistry, Released};
pub use message_record::MessageRecord;
pub use notification::{NotificationPayload, Origin};
