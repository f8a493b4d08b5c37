//! # switchyard-core
//!
//! Event model and event pools shared by every fleet component.
//!
//! ### Key Submodules:
//! - `events`: [`Event`], its JSON wire form, and the per-pool [`EventMetadata`] wrapper
//! - `pool`: generic [`EventPool`] plus the incoming, processing and sending specializations
//! - `time`: process-unique timestamp stamping used as the pool key
//!
//! Pools are plain `Sync` values: share them behind an `Arc` and call them from any thread.

pub mod error;
pub mod events;
pub mod pool;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::pool::*;
}

pub use error::{EventError, PoolError};
pub use events::{Destination, Endpoint, Event, EventMetadata, EventResult, Outcome, Priority};
pub use pool::{
    EventPool, IncomingEventPool, OverflowPolicy, PoolSettings, PoolStats, ProcessingEventPool,
    Requeue, SendingEventPool,
};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use crate::events::{Endpoint, Event};

    /// Event with a deterministic timestamp `i` milliseconds after a fixed epoch.
    pub fn event_at(i: u64) -> Event {
        event_to(i, 9000)
    }

    pub fn event_to(i: u64, port: u16) -> Event {
        let base = Utc.timestamp_opt(1_760_000_000, 0).unwrap();
        Event::new(
            Endpoint::new("source", "127.0.0.1", 7000),
            Endpoint::new("sink", "127.0.0.1", port),
            "test",
            json!(i),
        )
        .with_timestamp(base + Duration::milliseconds(i as i64))
    }
}
