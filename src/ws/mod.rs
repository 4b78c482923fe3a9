//! WebSocket layer: upgrade, per-connection read loop, and the transport
//! handle given to the connection registry.
//!
//! The endpoint at `/ws` accepts text frames as chat messages and pushes
//! every notification payload received by this process to the client.

pub mod connection;
pub mod handler;
pub mod sink;
