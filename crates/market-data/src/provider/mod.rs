//! Upstream client abstraction.
//!
//! - [`MarketDataClient`]: the trait an upstream adapter implements
//! - [`ClientCapabilities`] / [`RateLimit`]: what the adapter can do and how
//!   hard it may be called
//! - [`RateLimiter`]: per-endpoint token buckets
//!
//! No concrete client lives in this crate; adapters are supplied by the
//! embedding application and injected into the refresh executor.

mod capabilities;
mod rate_limiter;
mod traits;

pub use capabilities::{ClientCapabilities, RateLimit};
pub use rate_limiter::RateLimiter;
pub use traits::MarketDataClient;
