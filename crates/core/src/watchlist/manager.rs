//! Group/watchlist ownership.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use decidra_market_data::InstrumentId;

use super::model::Group;
use crate::errors::{Error, Result};
use crate::events::{WatchlistEvent, WatchlistEventSink};

/// Owns the user's groups and the set of tracked instruments.
///
/// An instrument is tracked while it belongs to at least one group. The
/// manager emits [`WatchlistEvent::InstrumentTracked`] when an instrument
/// enters its first group and [`WatchlistEvent::InstrumentUntracked`] when it
/// leaves its last one. Groups may be empty.
///
/// The manager is a plain owned value; wrap it in a lock to share it.
pub struct WatchlistManager {
    groups: Vec<Group>,
    /// Number of groups each tracked instrument belongs to.
    memberships: HashMap<InstrumentId, usize>,
    event_sink: Arc<dyn WatchlistEventSink>,
}

impl WatchlistManager {
    pub fn new(event_sink: Arc<dyn WatchlistEventSink>) -> Self {
        Self {
            groups: Vec::new(),
            memberships: HashMap::new(),
            event_sink,
        }
    }

    fn validate_name(name: &str) -> Result<&str> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidGroupName(name.to_string()));
        }
        Ok(trimmed)
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Creates an empty group. Returns false if it already exists.
    pub fn create_group(&mut self, name: &str) -> Result<bool> {
        let name = Self::validate_name(name)?;
        if self.group_index(name).is_some() {
            return Ok(false);
        }
        self.groups.push(Group::new(name));
        Ok(true)
    }

    /// Appends `id` to the group, creating the group if needed.
    ///
    /// Returns false when the instrument was already in the group.
    pub fn add_instrument(&mut self, group_name: &str, id: InstrumentId) -> Result<bool> {
        let name = Self::validate_name(group_name)?;
        let index = match self.group_index(name) {
            Some(index) => index,
            None => {
                self.groups.push(Group::new(name));
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[index];
        if group.contains(&id) {
            return Ok(false);
        }
        group.instruments.push(id.clone());
        debug!("Added {} to group '{}'", id, name);

        if self.retain(&id) {
            info!("Now tracking {}", id);
            self.event_sink.emit(WatchlistEvent::tracked(id));
        }
        Ok(true)
    }

    /// Removes `id` from the group.
    ///
    /// Returns false when the instrument was not in the group.
    pub fn remove_instrument(&mut self, group_name: &str, id: &InstrumentId) -> Result<bool> {
        let name = Self::validate_name(group_name)?;
        let index = self
            .group_index(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))?;

        let group = &mut self.groups[index];
        let Some(position) = group.instruments.iter().position(|i| i == id) else {
            return Ok(false);
        };
        group.instruments.remove(position);
        debug!("Removed {} from group '{}'", id, name);

        if self.release(id) {
            info!("No longer tracking {}", id);
            self.event_sink.emit(WatchlistEvent::untracked(id.clone()));
        }
        Ok(true)
    }

    /// Deletes a group and untracks instruments that were only in it.
    pub fn delete_group(&mut self, name: &str) -> Result<Group> {
        let name = Self::validate_name(name)?;
        let index = self
            .group_index(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))?;
        let group = self.groups.remove(index);

        let events: Vec<WatchlistEvent> = group
            .instruments
            .iter()
            .filter(|id| self.release(id))
            .map(|id| WatchlistEvent::untracked(id.clone()))
            .collect();
        if !events.is_empty() {
            self.event_sink.emit_batch(events);
        }
        Ok(group)
    }

    /// All groups in creation order.
    pub fn list_groups(&self) -> Vec<Group> {
        self.groups.clone()
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_tracked(&self, id: &InstrumentId) -> bool {
        self.memberships.contains_key(id)
    }

    /// Tracked instruments in first-appearance order across groups.
    pub fn tracked_instruments(&self) -> Vec<InstrumentId> {
        let mut seen = std::collections::HashSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.instruments.iter())
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    /// Replaces every group with a previously saved snapshot.
    ///
    /// Blank group names are skipped, groups with the same name are merged
    /// and duplicate instruments within a group are dropped, all keeping
    /// first occurrence order. Only instruments whose tracked status changes
    /// produce events.
    pub fn load_groups(&mut self, groups: Vec<Group>) {
        let mut loaded: Vec<Group> = Vec::new();
        for group in groups {
            let Ok(name) = Self::validate_name(&group.name) else {
                debug!("Skipping group with blank name during load");
                continue;
            };
            let index = match loaded.iter().position(|g| g.name == name) {
                Some(index) => index,
                None => {
                    loaded.push(Group::new(name));
                    loaded.len() - 1
                }
            };
            let target = &mut loaded[index];
            for id in group.instruments {
                if !target.contains(&id) {
                    target.instruments.push(id);
                }
            }
        }

        let mut memberships: HashMap<InstrumentId, usize> = HashMap::new();
        for id in loaded.iter().flat_map(|g| g.instruments.iter()) {
            *memberships.entry(id.clone()).or_insert(0) += 1;
        }

        let previous = std::mem::replace(&mut self.memberships, memberships);
        self.groups = loaded;

        let mut events: Vec<WatchlistEvent> = previous
            .keys()
            .filter(|id| !self.memberships.contains_key(*id))
            .map(|id| WatchlistEvent::untracked(id.clone()))
            .collect();
        events.extend(
            self.tracked_instruments()
                .into_iter()
                .filter(|id| !previous.contains_key(id))
                .map(WatchlistEvent::tracked),
        );

        info!(
            "Loaded {} group(s) tracking {} instrument(s)",
            self.groups.len(),
            self.memberships.len()
        );
        if !events.is_empty() {
            self.event_sink.emit_batch(events);
        }
    }

    /// Counts one more membership. Returns true if this is the first.
    fn retain(&mut self, id: &InstrumentId) -> bool {
        let count = self.memberships.entry(id.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drops one membership. Returns true if none are left.
    fn release(&mut self, id: &InstrumentId) -> bool {
        match self.memberships.get_mut(id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.memberships.remove(id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockWatchlistEventSink;
    use decidra_market_data::Market;

    fn id(code: &str) -> InstrumentId {
        InstrumentId::new(Market::Hk, code)
    }

    fn manager() -> (WatchlistManager, MockWatchlistEventSink) {
        let sink = MockWatchlistEventSink::new();
        (WatchlistManager::new(Arc::new(sink.clone())), sink)
    }

    #[test]
    fn test_add_creates_group_and_tracks() {
        let (mut manager, sink) = manager();

        assert!(manager.add_instrument("Tech", id("00700")).unwrap());
        assert!(!manager.add_instrument("Tech", id("00700")).unwrap());

        assert_eq!(manager.list_groups(), vec![Group::with_instruments("Tech", vec![id("00700")])]);
        assert_eq!(sink.events(), vec![WatchlistEvent::tracked(id("00700"))]);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let (mut manager, _) = manager();
        manager.add_instrument("Tech", id("09988")).unwrap();
        manager.add_instrument("Tech", id("00700")).unwrap();
        manager.add_instrument("Banks", id("00005")).unwrap();

        let groups = manager.list_groups();
        assert_eq!(groups[0].name, "Tech");
        assert_eq!(groups[0].instruments, vec![id("09988"), id("00700")]);
        assert_eq!(groups[1].name, "Banks");
    }

    #[test]
    fn test_second_group_does_not_retrack() {
        let (mut manager, sink) = manager();
        manager.add_instrument("Tech", id("00700")).unwrap();
        manager.add_instrument("Favourites", id("00700")).unwrap();
        assert_eq!(sink.len(), 1);

        manager.remove_instrument("Tech", &id("00700")).unwrap();
        assert_eq!(sink.len(), 1);
        assert!(manager.is_tracked(&id("00700")));

        manager.remove_instrument("Favourites", &id("00700")).unwrap();
        assert_eq!(sink.events()[1], WatchlistEvent::untracked(id("00700")));
        assert!(!manager.is_tracked(&id("00700")));
    }

    #[test]
    fn test_remove_from_unknown_group() {
        let (mut manager, _) = manager();
        assert!(matches!(
            manager.remove_instrument("Nope", &id("00700")),
            Err(Error::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_remove_absent_instrument_is_noop() {
        let (mut manager, sink) = manager();
        manager.create_group("Tech").unwrap();
        assert!(!manager.remove_instrument("Tech", &id("00700")).unwrap());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_blank_group_name_rejected() {
        let (mut manager, _) = manager();
        assert!(matches!(
            manager.add_instrument("  ", id("00700")),
            Err(Error::InvalidGroupName(_))
        ));
    }

    #[test]
    fn test_delete_group_untracks_exclusive_members() {
        let (mut manager, sink) = manager();
        manager.add_instrument("Tech", id("00700")).unwrap();
        manager.add_instrument("Tech", id("09988")).unwrap();
        manager.add_instrument("Other", id("09988")).unwrap();
        sink.clear();

        let removed = manager.delete_group("Tech").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(sink.events(), vec![WatchlistEvent::untracked(id("00700"))]);
        assert!(manager.is_tracked(&id("09988")));
    }

    #[test]
    fn test_load_groups_emits_only_changes() {
        let (mut manager, sink) = manager();
        manager.add_instrument("Tech", id("00700")).unwrap();
        manager.add_instrument("Tech", id("09988")).unwrap();
        sink.clear();

        manager.load_groups(vec![
            Group::with_instruments("Tech", vec![id("00700"), id("00700")]),
            Group::with_instruments("", vec![id("00001")]),
            Group::with_instruments("Banks", vec![id("00005")]),
            Group::with_instruments("Tech", vec![id("03690")]),
        ]);

        let groups = manager.list_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].instruments, vec![id("00700"), id("03690")]);
        assert_eq!(
            sink.events(),
            vec![
                WatchlistEvent::untracked(id("09988")),
                WatchlistEvent::tracked(id("03690")),
                WatchlistEvent::tracked(id("00005")),
            ]
        );
        assert!(!manager.is_tracked(&id("00001")));
    }

    #[test]
    fn test_list_then_load_round_trips() {
        let (mut manager, _) = manager();
        manager.add_instrument("Tech", id("00700")).unwrap();
        manager.add_instrument("Banks", id("00005")).unwrap();
        let saved = manager.list_groups();

        let (mut restored, sink) = self::manager();
        restored.load_groups(saved.clone());
        assert_eq!(restored.list_groups(), saved);
        assert_eq!(sink.len(), 2);
    }
}
