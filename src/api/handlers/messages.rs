//! Message submission and history handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CreateMessageRequest, HistoryParams, HistoryResponse, MessageResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `POST /messages` — Persist a message and fan it out.
///
/// The record is acknowledged once persisted; a failed notification is
/// reported in the body and does not turn the request into an error.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] on empty fields and
/// [`RelayError::Persistence`] if the message could not be stored.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Submit a message",
    description = "Persists the message, then publishes it to every connected WebSocket client on every relay process. The `delivery` field reports whether the real-time notification was published.",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message persisted", body = MessageResponse),
        (status = 400, description = "Empty username or body", body = ErrorResponse),
        (status = 500, description = "Message could not be persisted", body = ErrorResponse),
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, RelayError> {
    if req.username.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "username must not be empty".to_string(),
        ));
    }
    if req.body.is_empty() {
        return Err(RelayError::InvalidRequest(
            "body must not be empty".to_string(),
        ));
    }

    let submission = state
        .message_service
        .submit(&req.username, &req.body)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(submission))))
}

/// `GET /messages` — Recent message history.
///
/// # Errors
///
/// Returns [`RelayError::Persistence`] if the store cannot be queried.
#[utoipa::path(
    get,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "List recent messages",
    description = "Returns the most recent persisted messages, oldest first.",
    params(HistoryParams),
    responses(
        (status = 200, description = "Recent messages", body = HistoryResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, RelayError> {
    let messages = state.store.recent_messages(params.clamped_limit()).await?;
    Ok(Json(HistoryResponse { messages }))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/messages", post(create_message).get(list_messages))
}
