//! Global admission control for issued upload capacity.
//!
//! Every requirement handed to a client authorizes it to push bytes at the
//! store. The throttle meters how fast that capacity is granted across all
//! concurrent pushes, counted in whole MiB.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use silo_core::config::ThrottleConfig;
use std::num::NonZeroU32;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

struct Inner {
    limiter: DefaultDirectRateLimiter,
    burst: NonZeroU32,
}

/// Shared transfer throttle. Cheap to clone.
#[derive(Clone)]
pub struct TransferThrottle {
    /// `None` when throttling is disabled.
    inner: Option<Arc<Inner>>,
}

impl std::fmt::Debug for TransferThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferThrottle")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TransferThrottle {
    /// Build a throttle from configuration.
    pub fn new(config: &ThrottleConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let (Some(rate), Some(burst)) = (
            NonZeroU32::new(config.mib_per_second),
            NonZeroU32::new(config.burst_mib),
        ) else {
            tracing::warn!("throttle enabled with a zero rate or burst; leaving it off");
            return Self::disabled();
        };

        let quota = Quota::per_second(rate).allow_burst(burst);
        Self {
            inner: Some(Arc::new(Inner {
                limiter: RateLimiter::direct(quota),
                burst,
            })),
        }
    }

    /// A throttle that admits everything immediately.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Wait until `bytes` of upload capacity may be granted.
    ///
    /// Requests are rounded up to whole MiB and capped at the burst size, so
    /// a single large part can never wait forever.
    pub async fn admit(&self, bytes: u64) {
        let Some(inner) = &self.inner else {
            return;
        };

        let cells = bytes
            .div_ceil(MIB)
            .clamp(1, u64::from(inner.burst.get()));
        let cells = u32::try_from(cells)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(inner.burst);

        if let Err(e) = inner.limiter.until_n_ready(cells).await {
            // Unreachable with cells <= burst; admit rather than stall a push.
            tracing::warn!(cells = cells.get(), error = %e, "throttle request exceeds capacity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn enabled(mib_per_second: u32, burst_mib: u32) -> ThrottleConfig {
        ThrottleConfig {
            enabled: true,
            mib_per_second,
            burst_mib,
        }
    }

    #[tokio::test]
    async fn test_disabled_admits_immediately() {
        let throttle = TransferThrottle::new(&ThrottleConfig::default());
        assert!(!throttle.is_enabled());
        throttle.admit(u64::MAX).await;
    }

    #[test]
    fn test_zero_rate_disables() {
        assert!(!TransferThrottle::new(&enabled(0, 10)).is_enabled());
        assert!(!TransferThrottle::new(&enabled(10, 0)).is_enabled());
        assert!(TransferThrottle::new(&enabled(10, 10)).is_enabled());
    }

    #[tokio::test]
    async fn test_burst_is_admitted_without_waiting() {
        let throttle = TransferThrottle::new(&enabled(1, 8));
        let start = Instant::now();
        for _ in 0..8 {
            throttle.admit(MIB).await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_oversized_request_is_capped_at_burst() {
        let throttle = TransferThrottle::new(&enabled(1000, 4));
        // 100 MiB against a 4 MiB bucket would never fit if not capped.
        tokio::time::timeout(Duration::from_secs(5), throttle.admit(100 * MIB))
            .await
            .expect("capped request should be admitted");
    }

    #[tokio::test]
    async fn test_exhausted_bucket_waits() {
        let throttle = TransferThrottle::new(&enabled(2, 2));
        throttle.admit(2 * MIB).await;
        let start = Instant::now();
        throttle.admit(MIB).await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
