//! ## switchyard-core::pool::stats
//! **Point-in-time pool statistics**

use serde::Serialize;

use super::OverflowPolicy;

/// Snapshot returned by [`EventPool::stats`](super::EventPool::stats).
///
/// Totals are monotonic for the lifetime of the pool; `clear()` adds to
/// `total_removed` and never resets them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub size: usize,
    pub max_size: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub max_age_seconds: Option<f64>,
    pub total_added: u64,
    pub total_removed: u64,
    pub total_dropped: u64,
    pub oldest_timestamp: Option<String>,
    pub newest_timestamp: Option<String>,
}

impl PoolStats {
    /// Fraction of capacity in use, `None` for unbounded pools.
    pub fn fill_ratio(&self) -> Option<f64> {
        match self.max_size {
            Some(0) => Some(1.0),
            Some(max) => Some(self.size as f64 / max as f64),
            None => None,
        }
    }
}
