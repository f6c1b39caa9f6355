//! Decidra Core - adaptive market data refresh engine.
//!
//! Keeps a last-known snapshot of every watched instrument fresh without
//! wasting upstream quota:
//!
//! ```text
//!   WatchlistManager ──events──► RefreshScheduler ──jobs──► RefreshExecutor ──► MarketDataClient
//!   (groups)                      │  tick / sessions          │ timeout, normalize
//!                                 ▼                           │
//!                          InstrumentStateStore ◄─────────────┘
//!                                 │ read / subscribe_to_changes
//!                                 ▼
//!                          presentation layer
//! ```
//!
//! The upstream boundary (models, normalizer, session classifier, client
//! trait) lives in `decidra-market-data`.

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod refresh;
pub mod state;
pub mod watchlist;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RefreshConfig, SessionIntervals};
pub use refresh::{RefreshMode, RefreshScheduler, RefreshStats, RefreshTask, TaskState, TickReport};
pub use state::{InstrumentSnapshot, InstrumentStateStore};
pub use watchlist::{Group, WatchlistManager};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
