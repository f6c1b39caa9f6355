//! Upstream client trait definition.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{DataKind, InstrumentId, RawResult};

use super::capabilities::ClientCapabilities;

/// Trait for upstream market data clients.
///
/// Implementations own the connection to the upstream (an OpenD gateway, a
/// REST API, a replay file) and return payloads in whatever shape the
/// upstream produced. Normalization, timeouts and panic isolation are the
/// caller's job.
///
/// Only `fetch_quote` is mandatory. Other calls default to `NotSupported`,
/// which the caller treats like any other upstream failure.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use decidra_market_data::provider::{ClientCapabilities, MarketDataClient};
///
/// struct ReplayClient { /* ... */ }
///
/// #[async_trait]
/// impl MarketDataClient for ReplayClient {
///     fn id(&self) -> &'static str {
///         "REPLAY"
///     }
///
///     fn capabilities(&self) -> ClientCapabilities {
///         ClientCapabilities::default()
///     }
///
///     async fn fetch_quote(&self, id: &InstrumentId) -> Result<RawResult, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Identifier used in log lines.
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> ClientCapabilities;

    /// Fetch the latest quote snapshot for one instrument.
    async fn fetch_quote(&self, id: &InstrumentId) -> Result<RawResult, MarketDataError>;

    /// Fetch order book levels.
    async fn fetch_depth(&self, id: &InstrumentId) -> Result<RawResult, MarketDataError> {
        let _ = id;
        Err(self.not_supported("fetch_depth"))
    }

    /// Fetch recent trades.
    async fn fetch_ticks(&self, id: &InstrumentId) -> Result<RawResult, MarketDataError> {
        let _ = id;
        Err(self.not_supported("fetch_ticks"))
    }

    /// Fetch the broker queue.
    async fn fetch_broker_queue(&self, id: &InstrumentId) -> Result<RawResult, MarketDataError> {
        let _ = id;
        Err(self.not_supported("fetch_broker_queue"))
    }

    /// Fetch one data kind for several instruments in a single call.
    ///
    /// The returned rows carry a `code` field identifying their instrument.
    /// Only called for kinds listed in [`ClientCapabilities::batch_kinds`].
    async fn fetch_batch(
        &self,
        kind: DataKind,
        ids: &[InstrumentId],
    ) -> Result<RawResult, MarketDataError> {
        let _ = (kind, ids);
        Err(self.not_supported("fetch_batch"))
    }

    /// Start pushed updates for the given instruments and kinds.
    async fn subscribe(
        &self,
        ids: &[InstrumentId],
        kinds: &[DataKind],
    ) -> Result<(), MarketDataError> {
        let _ = (ids, kinds);
        Err(self.not_supported("subscribe"))
    }

    /// Stop pushed updates.
    async fn unsubscribe(
        &self,
        ids: &[InstrumentId],
        kinds: &[DataKind],
    ) -> Result<(), MarketDataError> {
        let _ = (ids, kinds);
        Err(self.not_supported("unsubscribe"))
    }

    /// Dispatch to the fetch method for `kind`.
    async fn fetch(&self, kind: DataKind, id: &InstrumentId) -> Result<RawResult, MarketDataError> {
        match kind {
            DataKind::Quote => self.fetch_quote(id).await,
            DataKind::Depth => self.fetch_depth(id).await,
            DataKind::Ticks => self.fetch_ticks(id).await,
            DataKind::BrokerQueue => self.fetch_broker_queue(id).await,
        }
    }

    #[doc(hidden)]
    fn not_supported(&self, operation: &str) -> MarketDataError {
        MarketDataError::NotSupported {
            operation: format!("{} ({})", operation, self.id()),
        }
    }
}
