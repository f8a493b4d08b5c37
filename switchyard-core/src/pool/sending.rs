//! Bounded outbox with retry tracking and per-destination batching.

use std::collections::BTreeMap;
use std::ops::Deref;

use tracing::{debug, warn};

use super::engine::PoolState;
use super::{EventPool, OverflowPolicy, PoolSettings};
use crate::error::PoolError;
use crate::events::{Destination, Event, EventMetadata};

pub const DEFAULT_SENDING_MAX_SIZE: usize = 50_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Events grouped by peer, each group in FIFO order.
pub type DestinationBatches = BTreeMap<Destination, Vec<EventMetadata>>;

/// What happened to an event handed back after a failed delivery.
#[derive(Debug)]
pub enum Requeue {
    /// Back in the outbox with the incremented retry count.
    Retrying(EventMetadata),
    /// Retry ceiling exceeded; the event is gone for good.
    Abandoned(Event),
    /// The outbox refused the re-insert (duplicate key or full under drop-newest).
    Rejected(Event),
}

#[derive(Debug)]
pub struct SendingEventPool {
    pool: EventPool,
    max_retries: u32,
}

impl SendingEventPool {
    /// Outbox with the standard limits: 50 000 entries, drop-oldest, 3 retries.
    pub fn new() -> Self {
        Self::with_settings(
            PoolSettings::bounded(DEFAULT_SENDING_MAX_SIZE, OverflowPolicy::DropOldest),
            DEFAULT_MAX_RETRIES,
        )
    }

    pub fn with_settings(settings: PoolSettings, max_retries: u32) -> Self {
        Self {
            pool: EventPool::new("sending", settings),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn append_with_retry(&self, event: Event, retry_count: u32) -> Result<bool, PoolError> {
        self.pool
            .append_metadata(EventMetadata::with_retry(event, retry_count))
    }

    /// Bumps the retry count of `key` in place.
    ///
    /// Returns the updated entry, or `None` if the key is absent or the new count
    /// exceeds `max_retries`, in which case the entry has been removed.
    pub fn increment_retry(&self, key: &str) -> Option<EventMetadata> {
        self.pool
            .with_state(|state| self.increment_retry_locked(state, key).ok())
    }

    /// Re-queues an event whose delivery failed: re-inserts it with its current
    /// retry count, then applies [`increment_retry`](Self::increment_retry), all
    /// under one lock acquisition.
    pub fn requeue_failed(&self, meta: EventMetadata) -> Result<Requeue, PoolError> {
        let retry_count = meta.retry_count;
        let event = meta.into_event();
        let key = event.key();

        self.pool.with_state(|state| {
            let inserted = self.pool.append_locked(
                state,
                EventMetadata::with_retry(event.clone(), retry_count),
            )?;
            if !inserted {
                return Ok(Requeue::Rejected(event));
            }
            Ok(match self.increment_retry_locked(state, &key) {
                Ok(updated) => Requeue::Retrying(updated),
                Err(Some(abandoned)) => Requeue::Abandoned(abandoned.into_event()),
                Err(None) => Requeue::Rejected(event),
            })
        })
    }

    /// Read-only partition of the outbox by destination.
    pub fn group_by_destination(&self) -> DestinationBatches {
        group(self.pool.snapshot())
    }

    /// Pops up to `batch_size` of the oldest entries pool-wide and partitions
    /// them by destination. Popped entries leave the pool.
    pub fn pop_batch_grouped(&self, batch_size: usize) -> DestinationBatches {
        let popped = self.pool.with_state(|state| {
            self.pool.expire_locked(state);
            let take = batch_size.min(state.len());
            (0..take)
                .filter_map(|_| state.pop_front())
                .collect::<Vec<_>>()
        });
        group(popped)
    }

    /// `Ok(updated)` while under the ceiling. `Err(Some(entry))` when the ceiling
    /// was exceeded and the entry removed, `Err(None)` when the key is absent.
    fn increment_retry_locked(
        &self,
        state: &mut PoolState,
        key: &str,
    ) -> Result<EventMetadata, Option<EventMetadata>> {
        let Some(meta) = state.get_mut(key) else {
            return Err(None);
        };
        meta.retry_count += 1;

        if meta.retry_count > self.max_retries {
            warn!(
                key,
                retries = meta.retry_count - 1,
                max_retries = self.max_retries,
                "Retry ceiling exceeded, removing event"
            );
            return Err(state.remove(key));
        }

        debug!(key, retry_count = meta.retry_count, "Retry scheduled");
        Ok(meta.clone())
    }
}

fn group(entries: Vec<EventMetadata>) -> DestinationBatches {
    let mut groups = DestinationBatches::new();
    for meta in entries {
        groups
            .entry(meta.event().destination())
            .or_default()
            .push(meta);
    }
    groups
}

impl Default for SendingEventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SendingEventPool {
    type Target = EventPool;

    fn deref(&self) -> &EventPool {
        &self.pool
    }
}
