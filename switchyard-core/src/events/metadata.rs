//! Queue-local bookkeeping wrapped around an [`Event`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::event::{Event, Priority};
use crate::time::seconds_since;

#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    event: Event,
    key: String,
    added_at: DateTime<Utc>,
    pub retry_count: u32,
    pub priority: Option<Priority>,
    /// Free-form annotations owned by whoever holds the entry.
    pub tags: BTreeMap<String, String>,
}

impl EventMetadata {
    pub fn new(event: Event) -> Self {
        Self::with_retry(event, 0)
    }

    pub fn with_retry(event: Event, retry_count: u32) -> Self {
        let key = event.key();
        let priority = event.priority;
        Self {
            event,
            key,
            added_at: Utc::now(),
            retry_count,
            priority,
            tags: BTreeMap::new(),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn timestamp_key(&self) -> &str {
        &self.key
    }

    /// Wall-clock instant the entry entered its pool.
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn age_seconds(&self) -> f64 {
        seconds_since(&self.added_at)
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
