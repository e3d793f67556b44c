use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::push::decode_request;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use silo_core::PushResponse;
use std::time::Instant;

/// POST /v1/push - Run one push round.
///
/// The body is decoded here rather than through the `Json` extractor so
/// malformed input is reported in the same error shape as everything else.
pub async fn push(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<PushResponse>> {
    metrics::PUSH_REQUESTS.inc();
    let started = Instant::now();

    let result = run_push(&state, &body).await;

    metrics::PUSH_DURATION.observe(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::record_push_error(e.code());
    }
    result.map(Json)
}

async fn run_push(state: &AppState, body: &[u8]) -> ApiResult<PushResponse> {
    let request = decode_request(body)?;
    let deadline = state.config.server.push_timeout();

    tokio::time::timeout(deadline, state.coordinator.push(&request))
        .await
        .map_err(|_| ApiError::Timeout(deadline))?
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
