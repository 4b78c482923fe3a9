//! Open-connection inspection handlers.
//!
//! These read the durable open-connection table, which spans every relay
//! process and may hold stale ids left behind by a crashed process.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ConnectionListResponse;
use crate::app_state::AppState;
use crate::domain::ConnectionId;
use crate::error::{ErrorResponse, RelayError};
use crate::persistence::OpenConnection;

/// `GET /connections` — List recorded open connections.
///
/// # Errors
///
/// Returns [`RelayError::Persistence`] if the store cannot be queried.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "List open connections",
    description = "Returns every connection id recorded as open by any relay process.",
    responses(
        (status = 200, description = "Recorded connections", body = ConnectionListResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    let connections = state.store.list_open_connections().await?;
    let total = connections.len();
    Ok(Json(ConnectionListResponse { connections, total }))
}

/// `GET /connections/{id}` — Look up one recorded connection.
///
/// # Errors
///
/// Returns [`RelayError::ConnectionNotFound`] if the id is not recorded,
/// or [`RelayError::Persistence`] if the store cannot be queried.
#[utoipa::path(
    get,
    path = "/api/v1/connections/{id}",
    tag = "Connections",
    summary = "Get an open connection",
    params(
        ("id" = String, Path, description = "Connection identifier"),
    ),
    responses(
        (status = 200, description = "Recorded connection", body = OpenConnection),
        (status = 404, description = "Connection not recorded", body = ErrorResponse),
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let id = ConnectionId::from(id);
    let connection = state
        .store
        .find_connection(&id)
        .await?
        .ok_or(RelayError::ConnectionNotFound(id))?;
    Ok(Json(connection))
}

/// Connection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections))
        .route("/connections/{id}", get(get_connection))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::RelayConfig;
    use crate::persistence::{ChatStore, InMemoryChatStore};
    use crate::test_support::RecordingChannel;

    async fn get(state: AppState, uri: &str) -> StatusCode {
        let Ok(request) = Request::get(uri).body(Body::empty()) else {
            panic!("request build failed");
        };
        let Ok(response) = routes().with_state(state).oneshot(request).await;
        response.status()
    }

    #[tokio::test]
    async fn lookup_distinguishes_known_and_unknown_ids() {
        let store = Arc::new(InMemoryChatStore::new());
        let _ = store.register_connection(&ConnectionId::from("known")).await;
        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn ChatStore>,
            Arc::new(RecordingChannel::default()),
            &RelayConfig::default(),
        );

        assert_eq!(get(state.clone(), "/connections/known").await, StatusCode::OK);
        assert_eq!(get(state.clone(), "/connections/unknown").await, StatusCode::NOT_FOUND);
        assert_eq!(get(state, "/connections").await, StatusCode::OK);
    }
}
