//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    ConnectionListResponse, CreateMessageRequest, HistoryResponse, MessageResponse,
};
use super::handlers::{connections, messages, system};
use crate::domain::{ConnectionId, MessageRecord};
use crate::error::{ErrorBody, ErrorResponse};
use crate::persistence::OpenConnection;
use crate::service::DeliveryStatus;

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "pgchat-relay",
        description = "Real-time chat relay. Messages submitted over HTTP or WebSocket are persisted and fanned out to every WebSocket client on every relay process."
    ),
    paths(
        messages::create_message,
        messages::list_messages,
        connections::list_connections,
        connections::get_connection,
        system::health_handler,
    ),
    components(schemas(
        CreateMessageRequest,
        MessageResponse,
        HistoryResponse,
        ConnectionListResponse,
        ConnectionId,
        MessageRecord,
        OpenConnection,
        DeliveryStatus,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Messages", description = "Submit messages and read history"),
        (name = "Connections", description = "Inspect recorded open connections"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Returns the OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
