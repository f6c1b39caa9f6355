//! Interval and backoff computation.

use std::time::Duration;

use chrono::{DateTime, Utc};

use decidra_market_data::SessionState;

use crate::config::RefreshConfig;

/// Interval after a successful refresh.
///
/// The session's base interval, capped by the visible interval for visible
/// instruments while prices can move, and never below the floor.
pub fn refresh_interval(config: &RefreshConfig, session: SessionState, visible: bool) -> Duration {
    let mut interval = config.intervals.for_state(session);
    if visible && session.is_trading() {
        interval = interval.min(config.visible_interval);
    }
    interval.max(config.min_interval)
}

/// Delay before retrying after `failures` consecutive failures.
///
/// `base * 2^(failures - 1)`, capped at the maximum, never below the floor.
pub fn backoff_delay(config: &RefreshConfig, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    let delay = config
        .backoff_base
        .checked_mul(1u32 << exponent)
        .unwrap_or(config.backoff_max);
    delay.min(config.backoff_max).max(config.min_interval)
}

/// `base + duration`, saturating at the latest representable instant.
pub(crate) fn due_after(base: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
