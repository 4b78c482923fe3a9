//! HTTP application assembly.

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::RelayConfig;
use crate::ws::handler::ws_handler;

/// Builds the complete router: REST endpoints, `/ws`, and (with the
/// `swagger-ui` feature) the interactive API docs.
pub fn build_app(state: AppState, config: &RelayConfig) -> Router {
    let router = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", api::openapi::openapi()),
    );

    router
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
