//! Pure session classification.

use chrono::{DateTime, Duration, Utc};

use super::calendar::TradingCalendar;
use super::state::SessionState;
use crate::models::Market;

/// Classifies `market` at `instant` against `calendar`.
///
/// Weekends, holidays and half-days are `Closed` all day. Otherwise the local
/// time of day decides. For an overnight session the date checked is the
/// day the session started.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use decidra_market_data::models::Market;
/// use decidra_market_data::session::{classify, SessionState, TradingCalendar};
///
/// let calendar = TradingCalendar::with_default_hours();
/// // Tuesday 10:00 in Hong Kong
/// let instant = Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap();
/// assert_eq!(classify(Market::Hk, instant, &calendar), SessionState::Open);
/// ```
pub fn classify(market: Market, instant: DateTime<Utc>, calendar: &TradingCalendar) -> SessionState {
    let Some(hours) = calendar.hours(market) else {
        return SessionState::Closed;
    };

    let local = instant.with_timezone(&hours.timezone);
    let phase = hours.phase_at(local.time());
    if phase.state == SessionState::Closed {
        return SessionState::Closed;
    }

    let mut session_date = local.date_naive();
    if phase.previous_day {
        session_date -= Duration::days(1);
    }
    if calendar.is_closed_day(market, session_date) {
        return SessionState::Closed;
    }
    phase.state
}
