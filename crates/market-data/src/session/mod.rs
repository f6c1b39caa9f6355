//! Market session classification.
//!
//! ```text
//!  instant (UTC) ──► market timezone ──► calendar (weekend/holiday/half-day)
//!                                               │
//!                                               ▼
//!                         MarketHours::phase_at(local time) ──► SessionState
//! ```
//!
//! Classification is a pure function of market, instant and calendar.
//! Upstream-reported states can be parsed with [`parse_upstream_state`] and
//! are layered on top by the caller.

mod calendar;
mod classifier;
mod hours;
mod state;
mod upstream;

pub use calendar::{MarketClosures, TradingCalendar};
pub use classifier::classify;
pub use hours::{MarketHours, Phase, SessionWindow};
pub use state::SessionState;
pub use upstream::parse_upstream_state;
