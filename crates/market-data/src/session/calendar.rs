//! Per-market trading hours, holidays and half-days.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::hours::MarketHours;
use crate::models::Market;

/// Closure dates for one market, in a form loadable from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketClosures {
    pub market: Option<Market>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub half_days: Vec<NaiveDate>,
}

/// Trading calendar used by the session classifier.
///
/// Half-days are treated as closed for the whole day. Markets without
/// configured hours are always closed.
#[derive(Clone, Debug)]
pub struct TradingCalendar {
    hours: HashMap<Market, MarketHours>,
    holidays: HashMap<Market, BTreeSet<NaiveDate>>,
    half_days: HashMap<Market, BTreeSet<NaiveDate>>,
    weekend: Vec<Weekday>,
}

impl TradingCalendar {
    /// An empty calendar: no hours, Saturday and Sunday off.
    pub fn new() -> Self {
        Self {
            hours: HashMap::new(),
            holidays: HashMap::new(),
            half_days: HashMap::new(),
            weekend: vec![Weekday::Sat, Weekday::Sun],
        }
    }

    /// A calendar with the built-in hours for every market and no holidays.
    pub fn with_default_hours() -> Self {
        let mut calendar = Self::new();
        for market in Market::ALL {
            calendar.set_hours(market, MarketHours::default_for(market));
        }
        calendar
    }

    pub fn set_hours(&mut self, market: Market, hours: MarketHours) {
        self.hours.insert(market, hours);
    }

    pub fn hours(&self, market: Market) -> Option<&MarketHours> {
        self.hours.get(&market)
    }

    pub fn add_holiday(&mut self, market: Market, date: NaiveDate) {
        self.holidays.entry(market).or_default().insert(date);
    }

    pub fn add_half_day(&mut self, market: Market, date: NaiveDate) {
        self.half_days.entry(market).or_default().insert(date);
    }

    /// Adds closures for one market (or every market when none is named).
    pub fn load_closures(&mut self, closures: &MarketClosures) {
        let markets: Vec<Market> = match closures.market {
            Some(market) => vec![market],
            None => Market::ALL.to_vec(),
        };
        for market in markets {
            for date in &closures.holidays {
                self.add_holiday(market, *date);
            }
            for date in &closures.half_days {
                self.add_half_day(market, *date);
            }
        }
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        self.weekend.contains(&date.weekday())
    }

    pub fn is_holiday(&self, market: Market, date: NaiveDate) -> bool {
        self.holidays
            .get(&market)
            .is_some_and(|dates| dates.contains(&date))
    }

    pub fn is_half_day(&self, market: Market, date: NaiveDate) -> bool {
        self.half_days
            .get(&market)
            .is_some_and(|dates| dates.contains(&date))
    }

    /// Whether `market` has no session at all on the local `date`.
    pub fn is_closed_day(&self, market: Market, date: NaiveDate) -> bool {
        self.is_weekend(date) || self.is_holiday(market, date) || self.is_half_day(market, date)
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekend() {
        let calendar = TradingCalendar::new();
        assert!(calendar.is_weekend(date(2024, 3, 9)));
        assert!(calendar.is_weekend(date(2024, 3, 10)));
        assert!(!calendar.is_weekend(date(2024, 3, 11)));
    }

    #[test]
    fn test_holidays_are_per_market() {
        let mut calendar = TradingCalendar::with_default_hours();
        calendar.add_holiday(Market::Hk, date(2024, 4, 4));

        assert!(calendar.is_closed_day(Market::Hk, date(2024, 4, 4)));
        assert!(!calendar.is_closed_day(Market::Us, date(2024, 4, 4)));
    }

    #[test]
    fn test_load_closures_from_json() {
        let closures: MarketClosures = serde_json::from_str(
            r#"{"market": "US", "holidays": ["2024-07-04"], "halfDays": ["2024-07-03"]}"#,
        )
        .unwrap();
        let mut calendar = TradingCalendar::new();
        calendar.load_closures(&closures);

        assert!(calendar.is_holiday(Market::Us, date(2024, 7, 4)));
        assert!(calendar.is_half_day(Market::Us, date(2024, 7, 3)));
        assert!(!calendar.is_holiday(Market::Hk, date(2024, 7, 4)));
    }

    #[test]
    fn test_closures_without_market_apply_everywhere() {
        let closures = MarketClosures {
            market: None,
            holidays: vec![date(2025, 1, 1)],
            half_days: vec![],
        };
        let mut calendar = TradingCalendar::new();
        calendar.load_closures(&closures);
        for market in Market::ALL {
            assert!(calendar.is_holiday(market, date(2025, 1, 1)));
        }
    }
}
