//! Thread-safe ordered container of [`EventMetadata`] keyed by event timestamp.
//!
//! Entries iterate in insertion order. "Oldest" is the earliest insertion still
//! present, never a minimum recomputed over timestamp values: an event carrying an
//! older timestamp that arrives late sits behind everything already queued.
//!
//! Every public method takes the pool mutex exactly once. Composite operations
//! (`extend`, the batch pops of the specialized pools) run the `*_locked` helpers
//! against the already-held [`PoolState`], so nothing re-enters the lock.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::stats::PoolStats;
use super::{OverflowPolicy, PoolSettings};
use crate::error::PoolError;
use crate::events::{Event, EventMetadata};

/// Mutable interior of a pool. Only reachable while the pool mutex is held.
#[derive(Debug, Default)]
pub struct PoolState {
    entries: BTreeMap<u64, EventMetadata>,
    index: HashMap<String, u64>,
    next_seq: u64,
    total_added: u64,
    total_removed: u64,
    total_dropped: u64,
}

impl PoolState {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&EventMetadata> {
        self.index.get(key).and_then(|seq| self.entries.get(seq))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut EventMetadata> {
        let seq = self.index.get(key)?;
        self.entries.get_mut(seq)
    }

    pub fn front(&self) -> Option<&EventMetadata> {
        self.entries.values().next()
    }

    pub fn back(&self) -> Option<&EventMetadata> {
        self.entries.values().next_back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventMetadata> {
        self.entries.values()
    }

    /// Removes the earliest insertion and counts it as removed.
    pub fn pop_front(&mut self) -> Option<EventMetadata> {
        let meta = self.unlink_front()?;
        self.total_removed += 1;
        Some(meta)
    }

    /// Removes by key and counts it as removed.
    pub fn remove(&mut self, key: &str) -> Option<EventMetadata> {
        let seq = self.index.remove(key)?;
        let meta = self.entries.remove(&seq)?;
        self.total_removed += 1;
        Some(meta)
    }

    /// Removes every entry matching `predicate`, oldest first, counting each as removed.
    pub fn drain_where<F>(&mut self, mut predicate: F) -> Vec<EventMetadata>
    where
        F: FnMut(&EventMetadata) -> bool,
    {
        let doomed: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, meta)| predicate(meta))
            .map(|(seq, _)| *seq)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for seq in doomed {
            if let Some(meta) = self.entries.remove(&seq) {
                self.index.remove(meta.timestamp_key());
                removed.push(meta);
            }
        }
        self.total_removed += removed.len() as u64;
        removed
    }

    fn push_back(&mut self, meta: EventMetadata) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(meta.timestamp_key().to_owned(), seq);
        self.entries.insert(seq, meta);
        self.total_added += 1;
    }

    fn unlink_front(&mut self) -> Option<EventMetadata> {
        let (_, meta) = self.entries.pop_first()?;
        self.index.remove(meta.timestamp_key());
        Some(meta)
    }
}

pub struct EventPool {
    name: String,
    settings: PoolSettings,
    state: Mutex<PoolState>,
}

impl EventPool {
    pub fn new(name: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Unbounded pool without expiry.
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, PoolSettings::unbounded())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Runs `f` with the pool lock held. Used by the specialized pools to build
    /// atomic composite operations out of the `*_locked` helpers.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut PoolState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Inserts `event` with a zero retry count.
    ///
    /// Returns `Ok(false)` for a duplicate key or a `DropNewest` rejection and
    /// `Err(PoolError::Overflow)` when full under `RaiseError`.
    pub fn append(&self, event: Event) -> Result<bool, PoolError> {
        self.append_metadata(EventMetadata::new(event))
    }

    /// Inserts a pre-built entry, preserving its retry count and tags.
    pub fn append_metadata(&self, meta: EventMetadata) -> Result<bool, PoolError> {
        self.with_state(|state| self.append_locked(state, meta))
    }

    /// Appends each event in order; returns how many were actually inserted.
    ///
    /// An overflow error under `RaiseError` stops the batch; events inserted
    /// before it stay in the pool.
    pub fn extend<I>(&self, events: I) -> Result<usize, PoolError>
    where
        I: IntoIterator<Item = Event>,
    {
        self.with_state(|state| {
            let mut inserted = 0;
            for event in events {
                if self.append_locked(state, EventMetadata::new(event))? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    pub fn pop_oldest(&self) -> Option<EventMetadata> {
        self.with_state(|state| {
            self.expire_locked(state);
            state.pop_front()
        })
    }

    pub fn pop_by_timestamp(&self, key: &str) -> Option<EventMetadata> {
        self.with_state(|state| {
            self.expire_locked(state);
            state.remove(key)
        })
    }

    pub fn get_by_timestamp(&self, key: &str) -> Option<EventMetadata> {
        self.state.lock().get(key).cloned()
    }

    pub fn peek_oldest(&self) -> Option<EventMetadata> {
        self.state.lock().front().cloned()
    }

    /// Snapshot of matching entries in insertion order. Does not mutate.
    pub fn filter<F>(&self, predicate: F) -> Vec<EventMetadata>
    where
        F: Fn(&EventMetadata) -> bool,
    {
        self.state
            .lock()
            .iter()
            .filter(|meta| predicate(meta))
            .cloned()
            .collect()
    }

    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&EventMetadata) -> bool,
    {
        self.with_state(|state| {
            self.expire_locked(state);
            state.drain_where(|meta| predicate(meta)).len()
        })
    }

    pub fn clear(&self) -> usize {
        self.with_state(|state| state.drain_where(|_| true).len())
    }

    /// Evicts entries older than `max_age_seconds`. A pool without a max age is untouched.
    pub fn cleanup_expired(&self) -> usize {
        self.with_state(|state| self.expire_locked(state))
    }

    /// Independent copy of every entry, safe to iterate without holding the lock.
    pub fn snapshot(&self) -> Vec<EventMetadata> {
        self.state.lock().iter().cloned().collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<EventMetadata> {
        self.snapshot().into_iter()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.contains_key(&event.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().contains_key(key)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            name: self.name.clone(),
            size: state.len(),
            max_size: self.settings.max_size,
            overflow_policy: self.settings.overflow_policy,
            max_age_seconds: self.settings.max_age_seconds,
            total_added: state.total_added,
            total_removed: state.total_removed,
            total_dropped: state.total_dropped,
            oldest_timestamp: state.front().map(|m| m.timestamp_key().to_owned()),
            newest_timestamp: state.back().map(|m| m.timestamp_key().to_owned()),
        }
    }

    pub(crate) fn append_locked(
        &self,
        state: &mut PoolState,
        meta: EventMetadata,
    ) -> Result<bool, PoolError> {
        self.expire_locked(state);

        if state.contains_key(meta.timestamp_key()) {
            debug!(
                pool = %self.name,
                key = meta.timestamp_key(),
                "Rejecting duplicate timestamp"
            );
            return Ok(false);
        }

        if let Some(max_size) = self.settings.max_size {
            if state.len() >= max_size {
                match self.settings.overflow_policy {
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = state.unlink_front() {
                            state.total_dropped += 1;
                            trace!(
                                pool = %self.name,
                                key = evicted.timestamp_key(),
                                "Pool full, evicted oldest entry"
                            );
                        }
                    }
                    OverflowPolicy::DropNewest => {
                        state.total_dropped += 1;
                        trace!(
                            pool = %self.name,
                            key = meta.timestamp_key(),
                            "Pool full, dropped incoming entry"
                        );
                        return Ok(false);
                    }
                    OverflowPolicy::RaiseError => {
                        warn!(pool = %self.name, max_size, "Pool overflow");
                        return Err(PoolError::Overflow {
                            pool: self.name.clone(),
                            max_size,
                        });
                    }
                    OverflowPolicy::Unlimited => {}
                }
            }
        }

        state.push_back(meta);
        Ok(true)
    }

    /// Entries are inserted with a fresh `added_at`, so age decreases from the
    /// front of the pool; the scan stops at the first live entry.
    pub(crate) fn expire_locked(&self, state: &mut PoolState) -> usize {
        let Some(max_age) = self.settings.max_age_seconds else {
            return 0;
        };

        let mut expired = 0;
        while state
            .front()
            .is_some_and(|meta| meta.age_seconds() > max_age)
        {
            state.pop_front();
            expired += 1;
        }
        if expired > 0 {
            debug!(pool = %self.name, expired, "Evicted expired entries");
        }
        expired
    }
}

impl<'a> IntoIterator for &'a EventPool {
    type Item = EventMetadata;
    type IntoIter = std::vec::IntoIter<EventMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for EventPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPool")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("len", &self.len())
            .finish()
    }
}
