//! Unbounded bookkeeping of events currently being worked on.
//!
//! The event's own `maximum_processing_time` is the deadline. The pool-level
//! `max_timeout` only shortens it: effective deadline = min(per-event, pool).

use std::ops::Deref;

use super::{EventPool, PoolSettings};
use crate::events::EventMetadata;

pub const DEFAULT_PROCESSING_MAX_TIMEOUT_SECONDS: f64 = 60.0;

#[derive(Debug)]
pub struct ProcessingEventPool {
    pool: EventPool,
    max_timeout: Option<f64>,
}

impl ProcessingEventPool {
    pub fn new() -> Self {
        Self::with_max_timeout(Some(DEFAULT_PROCESSING_MAX_TIMEOUT_SECONDS))
    }

    /// `None` disables the pool-level ceiling; per-event deadlines still apply.
    pub fn with_max_timeout(max_timeout: Option<f64>) -> Self {
        Self {
            pool: EventPool::new("processing", PoolSettings::unbounded()),
            max_timeout,
        }
    }

    pub fn max_timeout(&self) -> Option<f64> {
        self.max_timeout
    }

    /// Seconds `meta` may stay in the pool before it counts as timed out.
    pub fn deadline_for(&self, meta: &EventMetadata) -> f64 {
        let own = meta.event().maximum_processing_time;
        match self.max_timeout {
            Some(ceiling) if ceiling < own => ceiling,
            _ => own,
        }
    }

    pub fn is_timed_out(&self, meta: &EventMetadata) -> bool {
        meta.age_seconds() > self.deadline_for(meta)
    }

    /// Entries past their deadline, in insertion order. Does not remove them.
    pub fn get_timed_out_events(&self) -> Vec<EventMetadata> {
        self.pool.filter(|meta| self.is_timed_out(meta))
    }

    pub fn cleanup_timed_out(&self) -> usize {
        self.take_timed_out().len()
    }

    /// Removes and returns every timed-out entry in one critical section, so a
    /// sweep cannot race a concurrent `resolve` for the same event.
    pub fn take_timed_out(&self) -> Vec<EventMetadata> {
        self.pool
            .with_state(|state| state.drain_where(|meta| self.is_timed_out(meta)))
    }
}

impl Default for ProcessingEventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ProcessingEventPool {
    type Target = EventPool;

    fn deref(&self) -> &EventPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::OverflowPolicy;
    use crate::test_support::event_at;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn is_unbounded() {
        let pool = ProcessingEventPool::new();
        let stats = pool.stats();
        assert_eq!(stats.max_size, None);
        assert_eq!(stats.overflow_policy, OverflowPolicy::Unlimited);
    }

    #[test]
    fn reports_and_removes_timed_out_event() {
        let pool = ProcessingEventPool::new();
        pool.append(event_at(0).with_max_processing_time(0.1)).unwrap();
        pool.append(event_at(1)).unwrap();

        sleep(Duration::from_millis(150));

        let timed_out = pool.get_timed_out_events();
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].timestamp_key(), event_at(0).key());
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.cleanup_timed_out(), 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.get_timed_out_events().is_empty());
    }

    #[test]
    fn pool_ceiling_applies_only_when_stricter() {
        let pool = ProcessingEventPool::with_max_timeout(Some(5.0));
        let strict = EventMetadata::new(event_at(0).with_max_processing_time(1.0));
        let loose = EventMetadata::new(event_at(1).with_max_processing_time(30.0));

        assert_eq!(pool.deadline_for(&strict), 1.0);
        assert_eq!(pool.deadline_for(&loose), 5.0);
    }

    #[test]
    fn ceiling_shortens_long_deadlines() {
        let pool = ProcessingEventPool::with_max_timeout(Some(0.05));
        pool.append(event_at(0)).unwrap();
        sleep(Duration::from_millis(100));
        assert_eq!(pool.take_timed_out().len(), 1);
    }

    #[test]
    fn no_ceiling_defers_to_event() {
        let pool = ProcessingEventPool::with_max_timeout(None);
        let meta = EventMetadata::new(event_at(0).with_max_processing_time(42.0));
        assert_eq!(pool.deadline_for(&meta), 42.0);
    }
}
