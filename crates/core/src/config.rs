//! Refresh engine configuration.
//!
//! Every tuning constant of the scheduler lives in [`RefreshConfig`].
//! Durations serialize as integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use decidra_market_data::{DataKind, SessionState};

use crate::errors::{Error, Result};

/// Prefix of the environment variables read by [`RefreshConfig::from_env`].
pub const ENV_PREFIX: &str = "DECIDRA_";

/// Serde adapter storing a `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Base refresh interval for each session state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionIntervals {
    #[serde(with = "millis")]
    pub pre_market: Duration,
    #[serde(with = "millis")]
    pub open: Duration,
    #[serde(rename = "break", with = "millis")]
    pub lunch_break: Duration,
    #[serde(with = "millis")]
    pub after_hours: Duration,
    #[serde(with = "millis")]
    pub closed: Duration,
}

impl SessionIntervals {
    pub fn for_state(&self, state: SessionState) -> Duration {
        match state {
            SessionState::PreMarket => self.pre_market,
            SessionState::Open => self.open,
            SessionState::Break => self.lunch_break,
            SessionState::AfterHours => self.after_hours,
            SessionState::Closed => self.closed,
        }
    }
}

impl Default for SessionIntervals {
    fn default() -> Self {
        Self {
            pre_market: Duration::from_secs(10),
            open: Duration::from_secs(3),
            lunch_break: Duration::from_secs(30),
            after_hours: Duration::from_secs(10),
            closed: Duration::from_secs(300),
        }
    }
}

/// Scheduler, executor and store settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshConfig {
    pub intervals: SessionIntervals,

    /// Interval cap for instruments flagged visible during trading phases.
    #[serde(with = "millis")]
    pub visible_interval: Duration,

    /// No instrument is ever refreshed more often than this.
    #[serde(with = "millis")]
    pub min_interval: Duration,

    /// First retry delay after a failure; doubles per consecutive failure.
    #[serde(with = "millis")]
    pub backoff_base: Duration,

    #[serde(with = "millis")]
    pub backoff_max: Duration,

    /// Consecutive failures before the snapshot is flagged degraded.
    pub degraded_after_failures: u32,

    /// How long a removed instrument's snapshot stays readable.
    #[serde(with = "millis")]
    pub eviction_grace: Duration,

    /// Deadline for a single upstream call.
    #[serde(with = "millis")]
    pub request_timeout: Duration,

    /// Dispatched refresh jobs allowed to run at once.
    pub max_concurrent_requests: usize,

    /// Largest batch the scheduler builds, before the client's own limit.
    pub max_batch_size: usize,

    /// How long an upstream-reported market state overrides the classifier.
    #[serde(with = "millis")]
    pub upstream_state_ttl: Duration,

    /// Data kinds refreshed, in addition to quotes, for visible instruments.
    pub detail_kinds: Vec<DataKind>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            intervals: SessionIntervals::default(),
            visible_interval: Duration::from_secs(1),
            min_interval: Duration::from_secs(1),
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(120),
            degraded_after_failures: 5,
            eviction_grace: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            max_concurrent_requests: 8,
            max_batch_size: 200,
            upstream_state_ttl: Duration::from_secs(30),
            detail_kinds: vec![DataKind::Depth, DataKind::Ticks, DataKind::BrokerQueue],
        }
    }
}

impl RefreshConfig {
    /// Checks the settings for values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.min_interval.is_zero() {
            return Err(invalid("minInterval must be greater than zero"));
        }
        if self.backoff_base.is_zero() {
            return Err(invalid("backoffBase must be greater than zero"));
        }
        if self.backoff_max < self.backoff_base {
            return Err(invalid("backoffMax must not be less than backoffBase"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("requestTimeout must be greater than zero"));
        }
        if self.degraded_after_failures == 0 {
            return Err(invalid("degradedAfterFailures must be at least 1"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(invalid("maxConcurrentRequests must be at least 1"));
        }
        if self.max_concurrent_requests > Semaphore::MAX_PERMITS {
            return Err(invalid("maxConcurrentRequests exceeds the worker pool limit"));
        }
        if self.max_batch_size == 0 {
            return Err(invalid("maxBatchSize must be at least 1"));
        }
        if self.detail_kinds.contains(&DataKind::Quote) {
            return Err(invalid("detailKinds must not contain quote"));
        }
        Ok(())
    }

    /// Defaults overlaid with `DECIDRA_*` environment variables.
    ///
    /// Durations are given in milliseconds (`DECIDRA_OPEN_INTERVAL_MS=2000`),
    /// detail kinds as a comma separated list (`DECIDRA_DETAIL_KINDS=depth,ticks`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let durations: [(&str, &mut Duration); 12] = [
            ("PRE_MARKET_INTERVAL_MS", &mut config.intervals.pre_market),
            ("OPEN_INTERVAL_MS", &mut config.intervals.open),
            ("BREAK_INTERVAL_MS", &mut config.intervals.lunch_break),
            ("AFTER_HOURS_INTERVAL_MS", &mut config.intervals.after_hours),
            ("CLOSED_INTERVAL_MS", &mut config.intervals.closed),
            ("VISIBLE_INTERVAL_MS", &mut config.visible_interval),
            ("MIN_INTERVAL_MS", &mut config.min_interval),
            ("BACKOFF_BASE_MS", &mut config.backoff_base),
            ("BACKOFF_MAX_MS", &mut config.backoff_max),
            ("EVICTION_GRACE_MS", &mut config.eviction_grace),
            ("REQUEST_TIMEOUT_MS", &mut config.request_timeout),
            ("UPSTREAM_STATE_TTL_MS", &mut config.upstream_state_ttl),
        ];
        for (name, slot) in durations {
            if let Some(raw) = var(name) {
                *slot = Duration::from_millis(parse_number(name, &raw)?);
            }
        }

        if let Some(raw) = var("DEGRADED_AFTER_FAILURES") {
            config.degraded_after_failures = parse_number("DEGRADED_AFTER_FAILURES", &raw)?;
        }
        if let Some(raw) = var("MAX_CONCURRENT_REQUESTS") {
            config.max_concurrent_requests = parse_number("MAX_CONCURRENT_REQUESTS", &raw)?;
        }
        if let Some(raw) = var("MAX_BATCH_SIZE") {
            config.max_batch_size = parse_number("MAX_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = var("DETAIL_KINDS") {
            config.detail_kinds = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<DataKind>())
                .collect::<std::result::Result<_, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfigValue(message.to_string())
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::InvalidConfigValue(format!("{}{}: '{}' is not a valid number", ENV_PREFIX, name, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RefreshConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.intervals.for_state(SessionState::Open), Duration::from_secs(3));
        assert_eq!(config.intervals.for_state(SessionState::Closed), Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_zero_floor() {
        let config = RefreshConfig {
            min_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let config = RefreshConfig {
            backoff_base: Duration::from_secs(10),
            backoff_max: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_quote_detail_kind() {
        let config = RefreshConfig {
            detail_kinds: vec![DataKind::Quote],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overlay() {
        let config = RefreshConfig::from_lookup(lookup(&[
            ("DECIDRA_OPEN_INTERVAL_MS", "2000"),
            ("DECIDRA_DEGRADED_AFTER_FAILURES", "3"),
            ("DECIDRA_DETAIL_KINDS", "depth, broker_queue"),
        ]))
        .unwrap();

        assert_eq!(config.intervals.open, Duration::from_secs(2));
        assert_eq!(config.degraded_after_failures, 3);
        assert_eq!(config.detail_kinds, vec![DataKind::Depth, DataKind::BrokerQueue]);
        assert_eq!(config.intervals.closed, Duration::from_secs(300));
    }

    #[test]
    fn test_env_bad_number() {
        let result = RefreshConfig::from_lookup(lookup(&[("DECIDRA_MAX_BATCH_SIZE", "lots")]));
        match result {
            Err(Error::InvalidConfigValue(message)) => {
                assert!(message.contains("DECIDRA_MAX_BATCH_SIZE"))
            }
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_oversized_worker_pool() {
        let config = RefreshConfig {
            max_concurrent_requests: Semaphore::MAX_PERMITS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let result = RefreshConfig::from_lookup(lookup(&[(
            "DECIDRA_MAX_CONCURRENT_REQUESTS",
            &usize::MAX.to_string(),
        )]));
        assert!(matches!(result, Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_env_unknown_kind() {
        let result = RefreshConfig::from_lookup(lookup(&[("DECIDRA_DETAIL_KINDS", "news")]));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: RefreshConfig = serde_json::from_str(
            r#"{"intervals": {"open": 5000, "break": 60000}, "maxBatchSize": 50}"#,
        )
        .unwrap();
        assert_eq!(config.intervals.open, Duration::from_secs(5));
        assert_eq!(config.intervals.lunch_break, Duration::from_secs(60));
        assert_eq!(config.intervals.closed, Duration::from_secs(300));
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.min_interval, Duration::from_secs(1));
    }
}
