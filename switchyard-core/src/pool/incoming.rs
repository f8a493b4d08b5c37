//! Bounded inbox for freshly received events.

use std::ops::Deref;

use super::{EventPool, OverflowPolicy, PoolSettings};
use crate::events::EventMetadata;

pub const DEFAULT_INCOMING_MAX_SIZE: usize = 10_000;
pub const DEFAULT_INCOMING_MAX_AGE_SECONDS: f64 = 300.0;

#[derive(Debug)]
pub struct IncomingEventPool {
    pool: EventPool,
}

impl IncomingEventPool {
    /// Inbox with the standard limits: 10 000 entries, drop-oldest, 300 s expiry.
    pub fn new() -> Self {
        Self::with_settings(PoolSettings {
            max_size: Some(DEFAULT_INCOMING_MAX_SIZE),
            overflow_policy: OverflowPolicy::DropOldest,
            max_age_seconds: Some(DEFAULT_INCOMING_MAX_AGE_SECONDS),
        })
    }

    pub fn with_settings(settings: PoolSettings) -> Self {
        Self {
            pool: EventPool::new("incoming", settings),
        }
    }

    /// Removes up to `batch_size` of the oldest entries, returned in FIFO order.
    pub fn pop_batch(&self, batch_size: usize) -> Vec<EventMetadata> {
        self.pool.with_state(|state| {
            self.pool.expire_locked(state);
            let take = batch_size.min(state.len());
            (0..take).filter_map(|_| state.pop_front()).collect()
        })
    }
}

impl Default for IncomingEventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for IncomingEventPool {
    type Target = EventPool;

    fn deref(&self) -> &EventPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::event_at;

    #[test]
    fn defaults_match_inbox_limits() {
        let pool = IncomingEventPool::new();
        let stats = pool.stats();
        assert_eq!(stats.name, "incoming");
        assert_eq!(stats.max_size, Some(DEFAULT_INCOMING_MAX_SIZE));
        assert_eq!(stats.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(stats.max_age_seconds, Some(DEFAULT_INCOMING_MAX_AGE_SECONDS));
    }

    #[test]
    fn pop_batch_drains_in_fifo_chunks() {
        let pool = IncomingEventPool::new();
        pool.extend((0..5).map(event_at)).unwrap();

        let first = pool.pop_batch(3);
        assert_eq!(
            first.iter().map(|m| m.timestamp_key().to_owned()).collect::<Vec<_>>(),
            (0..3).map(|i| event_at(i).key()).collect::<Vec<_>>()
        );

        let rest = pool.pop_batch(10);
        assert_eq!(rest.len(), 2);
        assert!(pool.pop_batch(10).is_empty());
        assert_eq!(pool.stats().total_removed, 5);
    }

    #[test]
    fn pop_batch_of_zero_is_a_no_op() {
        let pool = IncomingEventPool::new();
        pool.append(event_at(0)).unwrap();
        assert!(pool.pop_batch(0).is_empty());
        assert_eq!(pool.len(), 1);
    }
}
