//! Watchlist events.
//!
//! The watchlist manager emits an event whenever an instrument starts or stops
//! being tracked by any group. The refresh scheduler implements the sink and
//! creates or retires refresh tasks in response.

mod sink;
mod watchlist_event;

pub use sink::*;
pub use watchlist_event::*;
