//! # pgchat-relay
//!
//! Real-time chat relay. Clients hold a WebSocket; every message accepted
//! from any client (or posted over HTTP) is persisted and then fanned out
//! to every connected client, including clients attached to a different
//! relay process.
//!
//! Cross-process fan-out rides on PostgreSQL `LISTEN`/`NOTIFY`: intake
//! publishes a small JSON envelope after the durable write, and each
//! process runs one listener that hands every envelope to its local
//! connection registry.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)          ├── WS Handler (ws/)
//!     │                                 │
//!     └──────────► MessageService (service/) ◄──┘
//!                    │              │
//!          ChatStore (persistence/)  NotificationChannel (channel/)
//!                                           │  LISTEN/NOTIFY
//!                   NotificationListener (service/), one per process
//!                                           │
//!                   ConnectionRegistry (domain/) ──► every local socket
//! ```

pub mod api;
pub mod app_state;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod server;
pub mod service;
pub mod ws;

#[cfg(test)]
mod test_support;
