//! Decidra Market Data Crate
//!
//! The upstream boundary of the decidra monitor: what a client returns, how
//! it is turned into typed records, and what trading phase a market is in.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | MarketDataClient  |  (injected; OpenD gateway, REST API, replay)
//! +-------------------+
//!           |
//!           v  RawResult (row / rows / table / error-as-value)
//! +-------------------+
//! |    normalizer     |  normalize() + demultiplex() for batches
//! +-------------------+
//!           |
//!           v  RefreshResult (Ok(records) / Empty / Failed)
//!
//! +-------------------+
//! |      session      |  classify(market, instant, calendar) -> SessionState
//! +-------------------+
//! ```
//!
//! # Core Types
//!
//! - [`InstrumentId`] - `MARKET.CODE` instrument identity
//! - [`DataKind`] - quote, depth, ticks, broker queue
//! - [`RawResult`] - upstream payload before normalization
//! - [`NormalizedRecord`] - one typed row
//! - [`RefreshResult`] - outcome of one refresh attempt
//! - [`SessionState`] - trading phase of a market

pub mod errors;
pub mod models;
pub mod normalizer;
pub mod provider;
pub mod session;

pub use errors::{ErrorKind, MarketDataError, ParseError, RefreshError};

pub use models::{
    DataKind, EndpointId, FieldValue, InstrumentCode, InstrumentId, Market, NormalizedRecord,
    RawResult, RawRow, RefreshResult,
};

pub use normalizer::{demultiplex, normalize};

pub use provider::{ClientCapabilities, MarketDataClient, RateLimit, RateLimiter};

pub use session::{
    classify, parse_upstream_state, MarketClosures, MarketHours, SessionState, SessionWindow,
    TradingCalendar,
};
