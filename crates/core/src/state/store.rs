//! Process-wide instrument state.
//!
//! ```text
//!   scheduler (writer)                       presentation (readers)
//!         │ apply_result / set_*                    │ read / subscribe_to_changes
//!         ▼                                         ▼
//!   DashMap<InstrumentId, Slot> ── Arc<InstrumentSnapshot> (swapped whole)
//!   DashMap<InstrumentId, watch::Sender<u64>> ── version notifications
//! ```
//!
//! Writers for one instrument are serialized by its map shard; writers for
//! different instruments rarely share a shard and never wait on readers for
//! longer than an `Arc` clone. A reader always sees a complete snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, trace};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use decidra_market_data::{DataKind, InstrumentId, RefreshResult, SessionState};

use super::snapshot::{InstrumentSnapshot, KindData};
use crate::refresh::RefreshMode;

/// Version notifications for one instrument.
///
/// Yields the new version after each successful update. The stream never
/// ends while the store is alive; dropping it and subscribing again restarts
/// from the next change.
pub type VersionChanges = WatchStream<u64>;

/// What [`InstrumentStateStore::apply_result`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Data for the kind was replaced and the version bumped.
    Updated { version: u64 },
    /// Only attempt/error metadata changed.
    MetadataOnly,
    /// The instrument is not tracked; nothing changed.
    Ignored,
}

struct Slot {
    snapshot: Arc<InstrumentSnapshot>,
    retired_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Copy-on-write update of the published snapshot.
    fn update(&mut self, f: impl FnOnce(&mut InstrumentSnapshot)) -> &InstrumentSnapshot {
        let mut next = InstrumentSnapshot::clone(&self.snapshot);
        f(&mut next);
        self.snapshot = Arc::new(next);
        &self.snapshot
    }
}

/// Last-known snapshot per tracked instrument.
#[derive(Default)]
pub struct InstrumentStateStore {
    slots: DashMap<InstrumentId, Slot>,
    watchers: DashMap<InstrumentId, watch::Sender<u64>>,
}

impl InstrumentStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `id` with an empty snapshot.
    ///
    /// Re-registering a retired instrument revives it with its data intact.
    /// Returns true if a new slot was created.
    pub fn register(&self, id: &InstrumentId) -> bool {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get_mut().retired_at.take().is_some() {
                    debug!("Revived state for {}", id);
                }
                false
            }
            Entry::Vacant(entry) => {
                // Keep versions monotonic for subscribers that outlived an eviction
                let version = self.watchers.get(id).map(|w| *w.borrow()).unwrap_or(0);
                entry.insert(Slot {
                    snapshot: Arc::new(InstrumentSnapshot::new(id.clone(), version)),
                    retired_at: None,
                });
                true
            }
        }
    }

    /// Stops accepting updates for `id`. The snapshot stays readable until
    /// [`evict`](Self::evict).
    pub fn retire(&self, id: &InstrumentId, at: DateTime<Utc>) {
        if let Some(mut slot) = self.slots.get_mut(id) {
            slot.retired_at.get_or_insert(at);
        }
    }

    /// Deletes the snapshot. Returns true if one existed.
    pub fn evict(&self, id: &InstrumentId) -> bool {
        let removed = self.slots.remove(id).is_some();
        self.prune_watchers();
        if removed {
            debug!("Evicted state for {}", id);
        }
        removed
    }

    pub fn is_tracked(&self, id: &InstrumentId) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| slot.retired_at.is_none())
    }

    /// Applies one refresh result for `kind`.
    ///
    /// `Ok` replaces that kind's records, clears the last error and bumps the
    /// version. `Empty` and `Failed` only touch attempt/error metadata.
    /// Untracked and retired instruments are ignored.
    pub fn apply_result(
        &self,
        id: &InstrumentId,
        kind: DataKind,
        result: &RefreshResult,
        at: DateTime<Utc>,
    ) -> ApplyOutcome {
        let Some(mut slot) = self.slots.get_mut(id) else {
            trace!("Ignoring {} result for untracked {}", kind, id);
            return ApplyOutcome::Ignored;
        };
        if slot.retired_at.is_some() {
            debug!("Discarding {} result for retired {}", kind, id);
            return ApplyOutcome::Ignored;
        }

        match result {
            RefreshResult::Ok(records) => {
                let version = slot
                    .update(|snapshot| {
                        snapshot.data.insert(
                            kind,
                            KindData {
                                records: Arc::from(records.as_slice()),
                                updated_at: at,
                            },
                        );
                        snapshot.last_success_at = Some(at);
                        snapshot.last_attempt_at = Some(at);
                        snapshot.last_error = None;
                        snapshot.version += 1;
                    })
                    .version;
                drop(slot);
                self.notify(id, version);
                ApplyOutcome::Updated { version }
            }
            RefreshResult::Empty => {
                slot.update(|snapshot| {
                    snapshot.last_attempt_at = Some(at);
                    snapshot.last_error = None;
                });
                ApplyOutcome::MetadataOnly
            }
            RefreshResult::Failed(error) => {
                slot.update(|snapshot| {
                    snapshot.last_attempt_at = Some(at);
                    snapshot.last_error = Some(error.clone());
                });
                ApplyOutcome::MetadataOnly
            }
        }
    }

    /// Records the market session and delivery mode shown with the snapshot.
    pub fn set_session(&self, id: &InstrumentId, session: SessionState, mode: RefreshMode) {
        self.update_tracked(id, |snapshot| {
            snapshot.session = Some(session);
            snapshot.mode = Some(mode);
        });
    }

    pub fn set_degraded(&self, id: &InstrumentId, degraded: bool) {
        self.update_tracked(id, |snapshot| snapshot.degraded = degraded);
    }

    fn update_tracked(&self, id: &InstrumentId, f: impl FnOnce(&mut InstrumentSnapshot)) {
        if let Some(mut slot) = self.slots.get_mut(id) {
            if slot.retired_at.is_none() {
                slot.update(f);
            }
        }
    }

    /// The current snapshot, including retired ones awaiting eviction.
    pub fn read(&self, id: &InstrumentId) -> Option<Arc<InstrumentSnapshot>> {
        self.slots.get(id).map(|slot| Arc::clone(&slot.snapshot))
    }

    pub fn version(&self, id: &InstrumentId) -> Option<u64> {
        self.slots.get(id).map(|slot| slot.snapshot.version)
    }

    /// Version notifications for `id`, starting with the next change.
    ///
    /// Subscribing before the instrument is tracked is allowed.
    pub fn subscribe_to_changes(&self, id: &InstrumentId) -> VersionChanges {
        WatchStream::from_changes(self.watch_version(id))
    }

    /// Raw watch receiver for callers that poll `borrow()` instead of streaming.
    pub fn watch_version(&self, id: &InstrumentId) -> watch::Receiver<u64> {
        self.prune_watchers();
        let current = self.version(id).unwrap_or(0);
        self.watchers
            .entry(id.clone())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    /// Drops senders whose receivers are all gone.
    fn prune_watchers(&self) {
        self.watchers.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Tracked (non-retired) instruments.
    pub fn tracked(&self) -> Vec<InstrumentId> {
        self.slots
            .iter()
            .filter(|slot| slot.retired_at.is_none())
            .map(|slot| slot.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn notify(&self, id: &InstrumentId, version: u64) {
        if let Some(sender) = self.watchers.get(id) {
            sender.send_replace(version);
        }
    }
}
