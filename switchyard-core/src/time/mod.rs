//! ## switchyard-core::time
//! **Strictly increasing wall-clock stamps for event keys**
//!
//! Pools key entries by the event timestamp, so two events stamped in the same
//! microsecond would collide and the second would be rejected as a duplicate.
//! `TimestampSource` hands out UTC instants that never repeat within a process.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

static PROCESS_SOURCE: TimestampSource = TimestampSource::new();

pub struct TimestampSource {
    last_micros: AtomicI64,
}

impl TimestampSource {
    pub const fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(i64::MIN),
        }
    }

    /// Process-wide source used by `Event::new`.
    pub fn global() -> &'static TimestampSource {
        &PROCESS_SOURCE
    }

    /// Returns the current UTC instant, bumped forward by one microsecond if the
    /// clock has not advanced since the previous stamp.
    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Acquire);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self.last_micros.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return micros_to_datetime(candidate),
                Err(observed) => last = observed,
            }
        }
    }
}

impl Default for TimestampSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical string form of a timestamp: RFC 3339, UTC, fixed nanosecond width.
///
/// Fixed width keeps lexical order equal to chronological order.
pub fn canonical_key(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Seconds elapsed since `instant`, as a float. Negative if `instant` is in the future.
pub fn seconds_since(instant: &DateTime<Utc>) -> f64 {
    let elapsed = Utc::now().signed_duration_since(*instant);
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    }
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_else(Utc::now)
}
