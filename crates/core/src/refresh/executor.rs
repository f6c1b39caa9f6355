//! One refresh call against the upstream client.
//!
//! The executor is the fault boundary: whatever the client does (error,
//! hang, panic, odd payload) comes out as a [`RefreshResult`]. It holds no
//! scheduling state and never writes to the state store.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use log::{debug, warn};

use decidra_market_data::{
    demultiplex, normalize, ClientCapabilities, DataKind, InstrumentId, MarketDataClient,
    MarketDataError, RateLimiter, RefreshError, RefreshResult,
};

pub struct RefreshExecutor {
    client: Arc<dyn MarketDataClient>,
    capabilities: ClientCapabilities,
    limiter: RateLimiter,
    timeout: Duration,
}

impl RefreshExecutor {
    pub fn new(client: Arc<dyn MarketDataClient>, timeout: Duration) -> Self {
        let capabilities = client.capabilities();
        let limiter = RateLimiter::new(capabilities.rate_limit.clone());
        Self {
            client,
            capabilities,
            limiter,
            timeout,
        }
    }

    pub fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    pub fn client_id(&self) -> &'static str {
        self.client.id()
    }

    /// Fetches and normalizes one kind for one instrument.
    pub async fn execute(&self, id: &InstrumentId, kind: DataKind) -> RefreshResult {
        self.limiter.acquire(kind.as_str()).await;
        let operation = format!("fetch {} {}", kind, id);
        let call = async {
            let raw = self.client.fetch(kind, id).await?;
            Ok::<_, MarketDataError>(normalize(&raw, kind))
        };
        self.guarded(&operation, call)
            .await
            .unwrap_or_else(RefreshResult::Failed)
    }

    /// Fetches one kind for several instruments of the same market.
    ///
    /// Uses the client's batch call when it supports `kind`, split into
    /// chunks of the client's maximum size; otherwise issues one call per
    /// instrument concurrently. A failed batch call fails every member.
    pub async fn execute_batch(
        &self,
        kind: DataKind,
        ids: &[InstrumentId],
    ) -> Vec<(InstrumentId, RefreshResult)> {
        if ids.len() > 1 && self.capabilities.supports_batch(kind) {
            let mut results = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(self.capabilities.max_batch_size) {
                results.extend(self.execute_chunk(kind, chunk).await);
            }
            return results;
        }

        let results = join_all(ids.iter().map(|id| self.execute(id, kind))).await;
        ids.iter().cloned().zip(results).collect()
    }

    async fn execute_chunk(
        &self,
        kind: DataKind,
        ids: &[InstrumentId],
    ) -> Vec<(InstrumentId, RefreshResult)> {
        let endpoint = format!("batch:{}", kind);
        self.limiter.acquire(&endpoint).await;
        let operation = format!("fetch batch {} x{}", kind, ids.len());
        let call = async {
            let raw = self.client.fetch_batch(kind, ids).await?;
            Ok::<_, MarketDataError>(demultiplex(normalize(&raw, kind), ids))
        };
        match self.guarded(&operation, call).await {
            Ok(results) => results,
            Err(error) => demultiplex(RefreshResult::Failed(error), ids),
        }
    }

    /// Asks the client for pushed updates. Failures are returned, not retried.
    pub async fn subscribe(&self, ids: &[InstrumentId], kinds: &[DataKind]) -> Result<(), RefreshError> {
        let operation = format!("subscribe {} instrument(s)", ids.len());
        self.guarded(&operation, self.client.subscribe(ids, kinds)).await
    }

    pub async fn unsubscribe(&self, ids: &[InstrumentId], kinds: &[DataKind]) -> Result<(), RefreshError> {
        let operation = format!("unsubscribe {} instrument(s)", ids.len());
        self.guarded(&operation, self.client.unsubscribe(ids, kinds)).await
    }

    /// Runs a client call under the timeout, converting errors and panics.
    ///
    /// Normalization runs inside `call` so a panic there is caught too.
    async fn guarded<T, F>(&self, operation: &str, call: F) -> Result<T, RefreshError>
    where
        F: Future<Output = Result<T, MarketDataError>>,
    {
        match tokio::time::timeout(self.timeout, AssertUnwindSafe(call).catch_unwind()).await {
            Err(_) => {
                debug!("{} timed out after {:?}", operation, self.timeout);
                Err(RefreshError::timeout(format!(
                    "{} timed out after {:?}",
                    operation, self.timeout
                )))
            }
            Ok(Err(panic)) => {
                let detail = panic_message(panic.as_ref());
                warn!("Client '{}' panicked during {}: {}", self.client.id(), operation, detail);
                Err(RefreshError::upstream(format!(
                    "client panicked during {}: {}",
                    operation, detail
                )))
            }
            Ok(Ok(Err(error))) => {
                debug!("{} failed: {}", operation, error);
                Err(error.into_refresh_error())
            }
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
