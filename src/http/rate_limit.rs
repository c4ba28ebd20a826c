//! Rate limiting implementation
//!
//! Uses the governor crate (GCRA) to admit at most N requests per second
//! across every clone of one [`RateLimiter`]. The burst is fixed at one
//! permit, so consecutive permits are at least `1/N` seconds apart and no
//! rolling one-second window ever holds more than N permits.

use crate::error::{Error, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per rolling second
    pub requests_per_second: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 8,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
        }
    }
}

/// Shared request-rate gate
///
/// Cloning is cheap and every clone draws from the same permit budget.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    granted: Arc<AtomicU64>,
    requests_per_second: u32,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    ///
    /// A ceiling of zero requests per second is a configuration error.
    pub fn new(config: &RateLimiterConfig) -> Result<Self> {
        let rps = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            Error::invalid_value("requests_per_second", "must be greater than zero")
        })?;

        let period = Duration::from_secs(1) / rps.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| Error::invalid_value("requests_per_second", "rate too high"))?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            limiter: Arc::new(Governor::direct(quota)),
            granted: Arc::new(AtomicU64::new(0)),
            requests_per_second: rps.get(),
        })
    }

    /// Shorthand for `RateLimiter::new(&RateLimiterConfig::new(rps))`
    pub fn per_second(requests_per_second: u32) -> Result<Self> {
        Self::new(&RateLimiterConfig::new(requests_per_second))
    }

    /// Wait until a request may be issued
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    /// Wait for a permit unless the run is cancelled first
    ///
    /// Once `cancel` fires no further permits are handed out.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = self.acquire() => Ok(()),
        }
    }

    /// Try to take a permit without waiting
    pub fn try_acquire(&self) -> bool {
        let ok = self.limiter.check().is_ok();
        if ok {
            self.granted.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    /// Total permits handed out so far
    pub fn permits_granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Configured ceiling
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .field("permits_granted", &self.permits_granted())
            .finish()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_second, 8);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let err = RateLimiter::per_second(0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[tokio::test]
    async fn test_first_permit_is_immediate() {
        let limiter = RateLimiter::per_second(5).unwrap();
        assert!(limiter.try_acquire());
        // Burst of one: the next permit is not available yet
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.permits_granted(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_budget() {
        let limiter = RateLimiter::per_second(2).unwrap();
        let other = limiter.clone();
        assert!(limiter.try_acquire());
        assert!(!other.try_acquire());
        assert_eq!(other.permits_granted(), 1);
    }

    #[tokio::test]
    async fn test_acquire_spaces_permits() {
        let limiter = RateLimiter::per_second(20).unwrap();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.acquire().await;
        }
        // Five gaps of 50ms each
        assert!(start.elapsed() >= Duration::from_millis(240));
        assert_eq!(limiter.permits_granted(), 6);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_admission() {
        let limiter = RateLimiter::per_second(1).unwrap();
        let cancel = CancellationToken::new();
        limiter.acquire_or_cancel(&cancel).await.unwrap();

        cancel.cancel();
        let err = limiter.acquire_or_cancel(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(limiter.permits_granted(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let limiter = RateLimiter::per_second(1).unwrap();
        limiter.acquire().await;

        let cancel = CancellationToken::new();
        let waiter = {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire_or_cancel(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
