use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

use switchyard_core::prelude::*;

fn event_at(i: u64) -> Event {
    let base = Utc.timestamp_opt(1_760_000_000, 0).unwrap();
    Event::new(
        Endpoint::new("prop", "127.0.0.1", 7000),
        Endpoint::new("sink", "127.0.0.1", 9000),
        "prop",
        json!(i),
    )
    .with_timestamp(base + Duration::microseconds(i as i64))
}

proptest! {
    #[test]
    fn unique_timestamps_all_land(ids in proptest::collection::hash_set(0u64..1_000_000, 0..200)) {
        let pool = EventPool::unbounded("unique");
        for id in &ids {
            prop_assert!(pool.append(event_at(*id)).unwrap());
        }
        prop_assert_eq!(pool.len(), ids.len());
    }

    #[test]
    fn second_append_of_same_timestamp_is_refused(id in 0u64..1_000_000) {
        let pool = EventPool::unbounded("dupe");
        prop_assert!(pool.append(event_at(id)).unwrap());
        prop_assert!(!pool.append(event_at(id)).unwrap());
        prop_assert_eq!(pool.len(), 1);
    }

    #[test]
    fn pop_oldest_replays_insertion_order(
        ids in proptest::collection::hash_set(0u64..1_000_000, 1..200)
    ) {
        // Deliberately unsorted: the pool must not reorder by timestamp value.
        let order: Vec<u64> = ids.into_iter().collect();
        let pool = EventPool::unbounded("fifo");
        pool.extend(order.iter().map(|id| event_at(*id))).unwrap();

        let popped: Vec<u64> = std::iter::from_fn(|| pool.pop_oldest())
            .map(|m| m.event().payload.as_u64().unwrap())
            .collect();
        prop_assert_eq!(popped, order);
    }

    #[test]
    fn drop_oldest_never_exceeds_capacity(max in 1usize..20, count in 0usize..100) {
        let settings = PoolSettings::bounded(max, OverflowPolicy::DropOldest);
        let pool = EventPool::new("bounded", settings);
        pool.extend((0..count as u64).map(event_at)).unwrap();

        let stats = pool.stats();
        prop_assert_eq!(stats.size, count.min(max));
        prop_assert_eq!(stats.total_dropped as usize, count.saturating_sub(max));
    }
}

#[test]
fn late_event_with_older_timestamp_is_not_reordered() {
    let pool = EventPool::unbounded("late");
    pool.append(event_at(10)).unwrap();
    pool.append(event_at(5)).unwrap();

    assert_eq!(pool.peek_oldest().unwrap().timestamp_key(), event_at(10).key());
    let stats = pool.stats();
    assert_eq!(stats.oldest_timestamp, Some(event_at(10).key()));
    assert_eq!(stats.newest_timestamp, Some(event_at(5).key()));
}

#[test]
fn concurrent_appends_lose_nothing() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 500;

    let pool = Arc::new(EventPool::unbounded("concurrent"));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = pool.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    assert!(pool.append(event_at(t * PER_THREAD + i)).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.size as u64, THREADS * PER_THREAD);
    assert_eq!(stats.total_added, THREADS * PER_THREAD);
}

#[test]
fn concurrent_producers_and_consumer_balance_out() {
    let pool = Arc::new(IncomingEventPool::new());
    let producers: Vec<_> = (0..4u64)
        .map(|t| {
            let pool = pool.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    pool.append(event_at(t * 1_000 + i)).unwrap();
                }
            })
        })
        .collect();

    let consumer = {
        let pool = pool.clone();
        thread::spawn(move || {
            let mut drained = 0;
            while drained < 1_000 {
                drained += pool.pop_batch(32).len();
                thread::yield_now();
            }
            drained
        })
    };

    for p in producers {
        p.join().unwrap();
    }
    assert_eq!(consumer.join().unwrap(), 1_000);
    assert!(pool.is_empty());
    assert_eq!(pool.stats().total_removed, 1_000);
}

#[test]
fn moving_between_pools_never_shares_an_entry() {
    let incoming = IncomingEventPool::new();
    let processing = ProcessingEventPool::new();
    incoming.append(event_at(1).expecting_reply()).unwrap();

    for meta in incoming.pop_batch(10) {
        processing.append(meta.into_event()).unwrap();
    }
    assert!(incoming.is_empty());
    assert_eq!(processing.len(), 1);
}
