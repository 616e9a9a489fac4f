// Live registry module
//
// This module provides the LiveRegistry: the foreground's materialized,
// display-ordered view of every torrent the engine has reported.

use crate::engine::BridgeEvent;
use crate::models::{TorrentId, TorrentSnapshot};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("torrent {0} is already registered")]
    Duplicate(TorrentId),

    #[error("torrent {0} is not registered")]
    NotFound(TorrentId),

    #[error("torrent id prefix {0:?} matches more than one torrent")]
    AmbiguousPrefix(String),
}

/// Sorted, id-keyed collection of the current torrent snapshots
///
/// Entries are kept in ascending name order (torrents with equal names stay in
/// arrival order) so a front-end can render [`iter()`](Self::iter) directly.
/// A position index gives O(1) lookup by id.
///
/// # Invariants
///
/// Between any two operations:
/// - for positions `i < j`, `name(i) <= name(j)`
/// - the ids in the position index are exactly the ids in the sequence
///
/// Snapshots are replaced wholesale, never patched.
#[derive(Debug, Default)]
pub struct LiveRegistry {
    entries: Vec<TorrentSnapshot>,
    positions: HashMap<TorrentId, usize>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a torrent that was not known before, at its sorted position
    pub fn insert_new(&mut self, snapshot: TorrentSnapshot) -> Result<(), RegistryError> {
        if self.positions.contains_key(&snapshot.id) {
            return Err(RegistryError::Duplicate(snapshot.id));
        }
        self.insert_sorted(snapshot);
        Ok(())
    }

    /// Replace an existing entry's data
    ///
    /// The entry keeps its position. Names are fixed once a torrent is added; if
    /// one does change anyway the entry is moved so the order stays valid.
    pub fn update(&mut self, snapshot: TorrentSnapshot) -> Result<(), RegistryError> {
        let position = *self
            .positions
            .get(&snapshot.id)
            .ok_or(RegistryError::NotFound(snapshot.id))?;

        if self.entries[position].name == snapshot.name {
            self.entries[position] = snapshot;
        } else {
            tracing::warn!(
                id = %snapshot.id,
                old = %self.entries[position].name,
                new = %snapshot.name,
                "torrent name changed after creation; re-sorting"
            );
            self.remove_at(position);
            self.insert_sorted(snapshot);
        }
        Ok(())
    }

    /// Remove the entry with the given id and return its last snapshot
    pub fn remove(&mut self, id: &TorrentId) -> Result<TorrentSnapshot, RegistryError> {
        let position = *self
            .positions
            .get(id)
            .ok_or(RegistryError::NotFound(*id))?;
        Ok(self.remove_at(position))
    }

    /// Apply one event from the engine bridge
    pub fn apply(&mut self, event: &BridgeEvent) -> Result<(), RegistryError> {
        match event {
            BridgeEvent::Added(snapshot) => self.insert_new(snapshot.clone()),
            BridgeEvent::Changed(snapshot) => self.update(snapshot.clone()),
            BridgeEvent::Removed(id) => self.remove(id).map(|_| ()),
            BridgeEvent::CommandFailed { .. } => Ok(()),
        }
    }

    fn insert_sorted(&mut self, snapshot: TorrentSnapshot) {
        let position = self
            .entries
            .partition_point(|entry| entry.name <= snapshot.name);
        self.entries.insert(position, snapshot);
        self.reindex_from(position);
    }

    fn remove_at(&mut self, position: usize) -> TorrentSnapshot {
        let removed = self.entries.remove(position);
        self.positions.remove(&removed.id);
        self.reindex_from(position);
        removed
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, entry) in self.entries[start..].iter().enumerate() {
            self.positions.insert(entry.id, start + offset);
        }
    }

    pub fn get(&self, id: &TorrentId) -> Option<&TorrentSnapshot> {
        self.positions.get(id).map(|&position| &self.entries[position])
    }

    pub fn position(&self, id: &TorrentId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &TorrentId) -> bool {
        self.positions.contains_key(id)
    }

    /// Entries in display order
    pub fn iter(&self) -> impl Iterator<Item = &TorrentSnapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the single torrent whose hex id starts with `prefix`
    ///
    /// Returns `Ok(None)` when nothing matches.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Option<TorrentId>, RegistryError> {
        let mut matches = self
            .entries
            .iter()
            .filter(|entry| entry.id.matches_prefix(prefix));
        let first = matches.next().map(|entry| entry.id);
        if matches.next().is_some() {
            return Err(RegistryError::AmbiguousPrefix(prefix.to_string()));
        }
        Ok(first)
    }

    /// Check both registry invariants; used by tests and debug assertions
    pub fn is_consistent(&self) -> bool {
        let sorted = self.entries.windows(2).all(|w| w[0].name <= w[1].name);
        let indexed = self.positions.len() == self.entries.len()
            && self
                .entries
                .iter()
                .enumerate()
                .all(|(position, entry)| self.positions.get(&entry.id) == Some(&position));
        sorted && indexed
    }
}
