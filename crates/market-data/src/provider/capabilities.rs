//! Client capabilities and rate limiting configuration.

use crate::models::DataKind;

/// Describes what an upstream client can do.
///
/// The executor and scheduler read this once per call to decide whether to
/// batch, how large a batch may be, and whether push subscriptions exist.
#[derive(Clone, Debug)]
pub struct ClientCapabilities {
    /// Data kinds that can be fetched for several instruments in one call.
    pub batch_kinds: &'static [DataKind],

    /// Upper bound on instruments per batch call.
    pub max_batch_size: usize,

    /// Whether the client delivers pushed updates after `subscribe`.
    pub supports_push: bool,

    /// Upstream quota, applied per endpoint.
    pub rate_limit: RateLimit,
}

impl ClientCapabilities {
    pub fn supports_batch(&self, kind: DataKind) -> bool {
        self.max_batch_size > 1 && self.batch_kinds.contains(&kind)
    }
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            batch_kinds: &[],
            max_batch_size: 1,
            supports_push: false,
            rate_limit: RateLimit::default(),
        }
    }
}

/// Token bucket settings for one upstream endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Sustained requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests that may be issued back to back before throttling starts.
    pub burst_capacity: f64,
}

impl RateLimit {
    /// Effectively unlimited, for local and test clients.
    pub fn unlimited() -> Self {
        Self {
            requests_per_minute: u32::MAX,
            burst_capacity: f64::from(u32::MAX),
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        // Upstream quote endpoints allow 60 calls per 30s window
        Self {
            requests_per_minute: 120,
            burst_capacity: 20.0,
        }
    }
}
