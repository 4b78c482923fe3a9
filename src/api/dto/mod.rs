//! Data Transfer Objects for REST request/response serialization.

pub mod connection_dto;
pub mod message_dto;

pub use connection_dto::*;
pub use message_dto::*;
