//! Watchlist event sink trait and implementations.

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;

use super::WatchlistEvent;

/// Receives tracking changes from the watchlist manager.
///
/// `emit()` is called synchronously from watchlist mutations, so it must be
/// fast and must not block on I/O.
pub trait WatchlistEventSink: Send + Sync {
    fn emit(&self, event: WatchlistEvent);

    /// Default implementation calls `emit()` for each event.
    fn emit_batch(&self, events: Vec<WatchlistEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpWatchlistEventSink;

impl WatchlistEventSink for NoOpWatchlistEventSink {
    fn emit(&self, _event: WatchlistEvent) {}
}

/// Collects emitted events for assertions.
#[derive(Clone, Default)]
pub struct MockWatchlistEventSink {
    events: Arc<Mutex<Vec<WatchlistEvent>>>,
}

impl MockWatchlistEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_events(&self) -> MutexGuard<'_, Vec<WatchlistEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| {
            warn!("Mock sink mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn events(&self) -> Vec<WatchlistEvent> {
        self.lock_events().clone()
    }

    pub fn clear(&self) {
        self.lock_events().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }
}

impl WatchlistEventSink for MockWatchlistEventSink {
    fn emit(&self, event: WatchlistEvent) {
        self.lock_events().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decidra_market_data::{InstrumentId, Market};

    fn id(code: &str) -> InstrumentId {
        InstrumentId::new(Market::Hk, code)
    }

    #[test]
    fn test_noop_sink_does_not_panic() {
        let sink = NoOpWatchlistEventSink;
        sink.emit(WatchlistEvent::tracked(id("00700")));
        sink.emit_batch(vec![
            WatchlistEvent::tracked(id("09988")),
            WatchlistEvent::untracked(id("00700")),
        ]);
    }

    #[test]
    fn test_mock_sink_collects_events() {
        let sink = MockWatchlistEventSink::new();
        assert!(sink.is_empty());

        sink.emit(WatchlistEvent::tracked(id("00700")));
        sink.emit_batch(vec![
            WatchlistEvent::tracked(id("09988")),
            WatchlistEvent::untracked(id("00700")),
        ]);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events()[2], WatchlistEvent::untracked(id("00700")));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&WatchlistEvent::tracked(id("00700"))).unwrap();
        assert_eq!(json, r#"{"type":"instrument_tracked","instrument":"HK.00700"}"#);
    }
}
