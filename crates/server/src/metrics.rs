//! Prometheus metrics for the Silo server.
//!
//! Counts push rounds, deduplicated and required blobs, multipart sessions,
//! and push latency.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! It must be network-restricted to authorized scrapers at the
//! infrastructure level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PUSH_REQUESTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("silo_push_requests_total", "Total number of push rounds received")
        .expect("metric creation failed")
});

pub static MANIFESTS_COMMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_manifests_committed_total",
        "Total number of manifests committed",
    )
    .expect("metric creation failed")
});

pub static BLOBS_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_blobs_deduplicated_total",
        "Total number of layers skipped because the blob was already stored",
    )
    .expect("metric creation failed")
});

pub static BLOBS_REQUIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_blobs_required_total",
        "Total number of blobs for which upload URLs were issued",
    )
    .expect("metric creation failed")
});

pub static MULTIPART_SESSIONS_OPENED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_multipart_sessions_opened_total",
        "Total number of multipart upload sessions opened",
    )
    .expect("metric creation failed")
});

pub static MULTIPART_SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_multipart_sessions_completed_total",
        "Total number of multipart upload sessions completed",
    )
    .expect("metric creation failed")
});

pub static PUSH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "silo_push_duration_seconds",
            "Time taken to handle one push round",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("metric creation failed")
});

pub static PUSH_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("silo_push_errors_total", "Total failed push rounds by error code"),
        &["code"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so integration tests can build any number of routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PUSH_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFESTS_COMMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOBS_DEDUPLICATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOBS_REQUIRED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MULTIPART_SESSIONS_OPENED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MULTIPART_SESSIONS_COMPLETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUSH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUSH_ERRORS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a failed push round under its API error code.
pub fn record_push_error(code: &str) {
    PUSH_ERRORS.with_label_values(&[code]).inc();
}
