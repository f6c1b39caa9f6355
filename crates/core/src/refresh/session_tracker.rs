//! Per-market session state as the scheduler sees it.
//!
//! The pure classifier is the default source. An upstream-reported market
//! state, when fresh, overrides it for that market.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;

use decidra_market_data::{classify, Market, SessionState, TradingCalendar};

pub(crate) struct SessionTracker {
    calendar: TradingCalendar,
    hints: HashMap<Market, (SessionState, DateTime<Utc>)>,
    last: HashMap<Market, SessionState>,
    hint_ttl: Duration,
}

impl SessionTracker {
    pub(crate) fn new(calendar: TradingCalendar, hint_ttl: Duration) -> Self {
        Self {
            calendar,
            hints: HashMap::new(),
            last: HashMap::new(),
            hint_ttl,
        }
    }

    pub(crate) fn record_hint(&mut self, market: Market, state: SessionState, at: DateTime<Utc>) {
        self.hints.insert(market, (state, at));
    }

    /// The session for `market` at `now`, without recording it.
    pub(crate) fn current(&self, market: Market, now: DateTime<Utc>) -> SessionState {
        if let Some((state, at)) = self.hints.get(&market) {
            let age = (now - *at).to_std().unwrap_or(Duration::ZERO);
            if age <= self.hint_ttl {
                return *state;
            }
        }
        classify(market, now, &self.calendar)
    }

    /// Records the session for `market` at `now`.
    ///
    /// Returns the state and, if it changed since the last observation, the
    /// previous one. The first observation of a market is not a change.
    pub(crate) fn observe(
        &mut self,
        market: Market,
        now: DateTime<Utc>,
    ) -> (SessionState, Option<SessionState>) {
        let state = self.current(market, now);
        match self.last.insert(market, state) {
            Some(previous) if previous != state => {
                debug!("{} session changed: {} -> {}", market, previous, state);
                (state, Some(previous))
            }
            _ => (state, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        // Tuesday 10:00 Hong Kong
        Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap()
    }

    fn tracker() -> SessionTracker {
        SessionTracker::new(TradingCalendar::with_default_hours(), Duration::from_secs(30))
    }

    #[test]
    fn test_first_observation_is_not_a_change() {
        let mut tracker = tracker();
        assert_eq!(tracker.observe(Market::Hk, t0()), (SessionState::Open, None));
        // Unchanged on the next observation
        assert_eq!(tracker.observe(Market::Hk, t0()), (SessionState::Open, None));
    }

    #[test]
    fn test_change_reports_previous() {
        let mut tracker = tracker();
        tracker.observe(Market::Hk, t0());
        // 12:30 local is the lunch break
        let lunch = t0() + chrono::Duration::minutes(150);
        assert_eq!(
            tracker.observe(Market::Hk, lunch),
            (SessionState::Break, Some(SessionState::Open))
        );
    }

    #[test]
    fn test_fresh_hint_overrides_classifier() {
        let mut tracker = tracker();
        tracker.record_hint(Market::Hk, SessionState::Closed, t0());
        assert_eq!(tracker.current(Market::Hk, t0()), SessionState::Closed);
        assert_eq!(
            tracker.current(Market::Hk, t0() + chrono::Duration::seconds(30)),
            SessionState::Closed
        );
    }

    #[test]
    fn test_stale_hint_falls_back_to_classifier() {
        let mut tracker = tracker();
        tracker.record_hint(Market::Hk, SessionState::Closed, t0());
        assert_eq!(
            tracker.current(Market::Hk, t0() + chrono::Duration::seconds(31)),
            SessionState::Open
        );
    }
}
