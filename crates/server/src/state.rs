//! Application state.

use crate::push::PushCoordinator;
use crate::throttle::TransferThrottle;
use silo_core::config::AppConfig;
use silo_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Push round driver.
    pub coordinator: Arc<PushCoordinator>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        let throttle = TransferThrottle::new(&config.throttle);
        if throttle.is_enabled() {
            tracing::info!(
                mib_per_second = config.throttle.mib_per_second,
                burst_mib = config.throttle.burst_mib,
                "transfer throttle enabled"
            );
        }

        let coordinator = PushCoordinator::new(storage.clone(), config.push.clone(), throttle);
        Self {
            config: Arc::new(config),
            storage,
            coordinator: Arc::new(coordinator),
        }
    }
}
