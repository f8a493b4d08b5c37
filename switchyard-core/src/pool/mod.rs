//! ## switchyard-core::pool
//! **Thread-safe event pools with capacity, overflow and expiry policies**
//!
//! ### Key Submodules:
//! - `engine`: generic [`EventPool`] (ordered, timestamp-keyed, lock-guarded)
//! - `incoming`: bounded inbox with batch drain
//! - `processing`: unbounded in-flight set with per-event deadlines
//! - `sending`: bounded outbox with retry ceiling and destination grouping
//! - `stats`: [`PoolStats`] snapshots

use serde::{Deserialize, Serialize};

pub mod engine;
pub mod incoming;
pub mod processing;
pub mod sending;
pub mod stats;

pub use engine::{EventPool, PoolState};
pub use incoming::IncomingEventPool;
pub use processing::ProcessingEventPool;
pub use sending::{Requeue, SendingEventPool};
pub use stats::PoolStats;

/// Rule applied when a bounded pool is full at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the earliest insertion to make room (counted as dropped).
    DropOldest,
    /// Refuse the new entry (counted as dropped).
    DropNewest,
    /// Refuse the new entry with [`PoolError::Overflow`](crate::PoolError::Overflow).
    RaiseError,
    /// Ignore `max_size`.
    Unlimited,
}

/// Construction-time configuration of a pool. Fixed for the pool's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    pub max_size: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub max_age_seconds: Option<f64>,
}

impl PoolSettings {
    pub fn unbounded() -> Self {
        Self {
            max_size: None,
            overflow_policy: OverflowPolicy::Unlimited,
            max_age_seconds: None,
        }
    }

    pub fn bounded(max_size: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            max_size: Some(max_size),
            overflow_policy,
            max_age_seconds: None,
        }
    }

    pub fn with_max_age(mut self, seconds: f64) -> Self {
        self.max_age_seconds = Some(seconds);
        self
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: None,
            overflow_policy: OverflowPolicy::DropOldest,
            max_age_seconds: None,
        }
    }
}
