//! ## switchyard-core::events
//! **Message model shared by every fleet component**
//!
//! - `event`: routed, time-stamped [`Event`] and its JSON wire form
//! - `metadata`: [`EventMetadata`], the per-pool wrapper (retries, insertion time, tags)

pub mod event;
pub mod metadata;

pub use event::{
    Destination, Endpoint, Event, EventResult, Outcome, Priority, DEFAULT_MAX_PROCESSING_TIME,
    TIMEOUT_ERROR_CODE,
};
pub use metadata::EventMetadata;
