//! Token bucket rate limiter for upstream endpoints.
//!
//! Each endpoint ("quote", "depth", "batch:quote", ...) gets its own bucket.
//! Buckets are created on first use from the limiter's default settings, or
//! from a per-endpoint override.
//!
//! Time is read from `tokio::time::Instant`, so a paused test runtime
//! controls refill.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::capabilities::RateLimit;
use crate::models::EndpointId;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(limit: &RateLimit) -> Self {
        let capacity = limit.burst_capacity.max(1.0);
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes a token, or returns how long until one is available.
    fn take(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
        }
    }
}

/// Per-endpoint token bucket limiter.
pub struct RateLimiter {
    default_limit: RateLimit,
    overrides: HashMap<EndpointId, RateLimit>,
    buckets: Mutex<HashMap<EndpointId, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(default_limit: RateLimit) -> Self {
        Self {
            default_limit,
            overrides: HashMap::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different limit for one endpoint.
    pub fn with_endpoint_limit(mut self, endpoint: impl Into<EndpointId>, limit: RateLimit) -> Self {
        self.overrides.insert(endpoint.into(), limit);
        self
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<EndpointId, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn limit_for(&self, endpoint: &str) -> &RateLimit {
        self.overrides.get(endpoint).unwrap_or(&self.default_limit)
    }

    fn take(&self, endpoint: &str) -> Result<(), Duration> {
        let mut buckets = self.lock_buckets();
        if let Some(bucket) = buckets.get_mut(endpoint) {
            return bucket.take();
        }
        let mut bucket = TokenBucket::new(self.limit_for(endpoint));
        let taken = bucket.take();
        buckets.insert(EndpointId::Owned(endpoint.to_string()), bucket);
        taken
    }

    /// Waits until a token for `endpoint` is available, then takes it.
    pub async fn acquire(&self, endpoint: &str) {
        loop {
            match self.take(endpoint) {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limiter: waiting {:?} for endpoint '{}'", wait, endpoint);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Takes a token without waiting. Returns false when throttled.
    pub fn try_acquire(&self, endpoint: &str) -> bool {
        self.take(endpoint).is_ok()
    }

    pub fn remaining_tokens(&self, endpoint: &str) -> f64 {
        let mut buckets = self.lock_buckets();
        match buckets.get_mut(endpoint) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => self.limit_for(endpoint).burst_capacity.max(1.0),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(requests_per_minute: u32, burst_capacity: f64) -> RateLimit {
        RateLimit {
            requests_per_minute,
            burst_capacity,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_throttle() {
        let limiter = RateLimiter::new(limit(60, 3.0));

        for _ in 0..3 {
            assert!(limiter.try_acquire("quote"));
        }
        assert!(!limiter.try_acquire("quote"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoints_are_isolated() {
        let limiter = RateLimiter::new(limit(60, 1.0));

        assert!(limiter.try_acquire("quote"));
        assert!(!limiter.try_acquire("quote"));
        assert!(limiter.try_acquire("depth"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_override() {
        let limiter =
            RateLimiter::new(limit(60, 1.0)).with_endpoint_limit("batch:quote", limit(60, 5.0));

        for _ in 0..5 {
            assert!(limiter.try_acquire("batch:quote"));
        }
        assert!(!limiter.try_acquire("batch:quote"));
        assert!((limiter.remaining_tokens("quote") - 1.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        // One token per second
        let limiter = RateLimiter::new(limit(60, 1.0));
        assert!(limiter.try_acquire("quote"));
        assert!(!limiter.try_acquire("quote"));

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(limiter.try_acquire("quote"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(limit(60, 1.0));
        limiter.acquire("quote").await;

        let start = Instant::now();
        limiter.acquire("quote").await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
