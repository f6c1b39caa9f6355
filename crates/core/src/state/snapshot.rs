use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use decidra_market_data::{
    DataKind, InstrumentId, NormalizedRecord, RefreshError, SessionState,
};

use crate::refresh::RefreshMode;

/// Records for one data kind, as of the last successful refresh of that kind.
#[derive(Clone, Debug, PartialEq)]
pub struct KindData {
    pub records: Arc<[NormalizedRecord]>,
    pub updated_at: DateTime<Utc>,
}

/// Last-known state of one instrument.
///
/// Snapshots are immutable once published; the store swaps in a new one on
/// every change. Cloning is cheap because record lists are shared.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentSnapshot {
    pub instrument: InstrumentId,
    pub data: BTreeMap<DataKind, KindData>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<RefreshError>,
    pub session: Option<SessionState>,
    pub mode: Option<RefreshMode>,
    /// Set after repeated consecutive failures; cleared by the next success.
    pub degraded: bool,
    /// Bumped on every `Ok` result, never otherwise.
    pub version: u64,
}

impl InstrumentSnapshot {
    pub fn new(instrument: InstrumentId, version: u64) -> Self {
        Self {
            instrument,
            data: BTreeMap::new(),
            last_success_at: None,
            last_attempt_at: None,
            last_error: None,
            session: None,
            mode: None,
            degraded: false,
            version,
        }
    }

    pub fn records(&self, kind: DataKind) -> &[NormalizedRecord] {
        self.data
            .get(&kind)
            .map(|d| &d.records[..])
            .unwrap_or_default()
    }

    /// First record of `kind`, e.g. the quote row.
    pub fn latest(&self, kind: DataKind) -> Option<&NormalizedRecord> {
        self.records(kind).first()
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// True when there has been no successful refresh within `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_success_at {
            Some(at) => now - at > max_age,
            None => true,
        }
    }
}
