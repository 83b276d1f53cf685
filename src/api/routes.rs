//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::correlation_id_middleware;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    let admin_routes = Router::new()
        .route(
            "/tokens",
            get(handlers::admin::list_tokens).post(handlers::admin::create_token),
        )
        .route("/tokens/:alias", axum::routing::delete(handlers::admin::delete_token))
        .route("/stats", get(handlers::admin::stats_report))
        .route("/failures", get(handlers::admin::list_failures));

    Router::new()
        // Health endpoint (no auth required)
        .route("/health", get(handlers::health::health_check))
        // Administrative surface (manager tokens only)
        .nest("/api", admin_routes)
        // Repository content routes; uploads can be large, so the body
        // limit comes from configuration instead of Axum's 2 MB default
        .route(
            "/:repository/*path",
            get(handlers::maven::download).put(handlers::maven::upload),
        )
        .route("/:repository", get(handlers::maven::browse_root))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
