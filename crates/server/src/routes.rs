//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/v1/push", post(handlers::push))
        .route("/v1/health", get(handlers::health_check));

    // SECURITY: when enabled, this endpoint must be network-restricted to
    // authorized Prometheus scrapers. See crate::metrics.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
