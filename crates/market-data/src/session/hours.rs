//! Trading hours per market, in exchange-local time.

use chrono::NaiveTime;
use chrono_tz::Tz;

use super::state::SessionState;
use crate::models::Market;

/// A half-open local-time window `[start, end)`.
///
/// When `end <= start` the window wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }

    /// Whether `t` falls in the part of a wrapping window after midnight.
    ///
    /// Such instants belong to the previous calendar day's session.
    pub fn in_overnight_tail(&self, t: NaiveTime) -> bool {
        self.wraps_midnight() && t < self.end
    }
}

/// Phase lookup result for a local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phase {
    pub state: SessionState,
    /// The instant belongs to the previous local date's session.
    pub previous_day: bool,
}

/// Local trading hours for one market.
///
/// Breaks are not configured directly: they are the gaps between consecutive
/// regular sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketHours {
    pub timezone: Tz,
    pub pre_market: Option<SessionWindow>,
    /// Regular sessions in chronological order.
    pub regular: Vec<SessionWindow>,
    pub after_hours: Option<SessionWindow>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl MarketHours {
    pub fn new(timezone: Tz, regular: Vec<SessionWindow>) -> Self {
        Self {
            timezone,
            pre_market: None,
            regular,
            after_hours: None,
        }
    }

    pub fn with_pre_market(mut self, window: SessionWindow) -> Self {
        self.pre_market = Some(window);
        self
    }

    pub fn with_after_hours(mut self, window: SessionWindow) -> Self {
        self.after_hours = Some(window);
        self
    }

    /// Built-in hours for each supported market.
    ///
    /// | Market | Pre-market | Regular | After-hours |
    /// |--------|------------|---------|-------------|
    /// | HK | 09:00-09:30 | 09:30-12:00, 13:00-16:00 | 16:00-16:10 |
    /// | US | 04:00-09:30 | 09:30-16:00 | 16:00-20:00 |
    /// | SH, SZ | 09:15-09:30 | 09:30-11:30, 13:00-15:00 | none |
    pub fn default_for(market: Market) -> Self {
        match market {
            Market::Hk => Self::new(
                chrono_tz::Asia::Hong_Kong,
                vec![
                    SessionWindow::new(hm(9, 30), hm(12, 0)),
                    SessionWindow::new(hm(13, 0), hm(16, 0)),
                ],
            )
            .with_pre_market(SessionWindow::new(hm(9, 0), hm(9, 30)))
            .with_after_hours(SessionWindow::new(hm(16, 0), hm(16, 10))),
            Market::Us => Self::new(
                chrono_tz::America::New_York,
                vec![SessionWindow::new(hm(9, 30), hm(16, 0))],
            )
            .with_pre_market(SessionWindow::new(hm(4, 0), hm(9, 30)))
            .with_after_hours(SessionWindow::new(hm(16, 0), hm(20, 0))),
            Market::Sh | Market::Sz => Self::new(
                chrono_tz::Asia::Shanghai,
                vec![
                    SessionWindow::new(hm(9, 30), hm(11, 30)),
                    SessionWindow::new(hm(13, 0), hm(15, 0)),
                ],
            )
            .with_pre_market(SessionWindow::new(hm(9, 15), hm(9, 30))),
        }
    }

    /// Gaps between consecutive regular sessions.
    pub fn breaks(&self) -> impl Iterator<Item = SessionWindow> + '_ {
        self.regular
            .windows(2)
            .map(|pair| SessionWindow::new(pair[0].end, pair[1].start))
            .filter(|gap| gap.start != gap.end)
    }

    /// Classifies a local time of day, ignoring the calendar.
    ///
    /// Regular sessions win over breaks, breaks over pre-market, pre-market
    /// over after-hours.
    pub fn phase_at(&self, t: NaiveTime) -> Phase {
        if let Some(window) = self.regular.iter().find(|w| w.contains(t)) {
            return Phase {
                state: SessionState::Open,
                previous_day: window.in_overnight_tail(t),
            };
        }
        if let Some(gap) = self.breaks().find(|w| w.contains(t)) {
            return Phase {
                state: SessionState::Break,
                previous_day: gap.in_overnight_tail(t),
            };
        }
        let extended = [
            (self.pre_market, SessionState::PreMarket),
            (self.after_hours, SessionState::AfterHours),
        ];
        for (window, state) in extended {
            if let Some(window) = window.filter(|w| w.contains(t)) {
                return Phase {
                    state,
                    previous_day: window.in_overnight_tail(t),
                };
            }
        }
        Phase {
            state: SessionState::Closed,
            previous_day: false,
        }
    }
}
