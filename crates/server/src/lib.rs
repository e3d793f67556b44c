//! HTTP API server for the Silo registry.
//!
//! This crate provides:
//! - The push coordinator: completion reconciliation, blob deduplication,
//!   upload planning, and manifest commit
//! - A global transfer throttle
//! - The HTTP surface and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod push;
pub mod routes;
pub mod state;
pub mod throttle;

pub use error::{ApiError, ApiResult};
pub use push::PushCoordinator;
pub use routes::create_router;
pub use state::AppState;
pub use throttle::TransferThrottle;
