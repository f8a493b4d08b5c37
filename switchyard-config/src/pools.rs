//! Pool sizing, overflow and expiry parameters.
//!
//! Defaults mirror the built-in pool constructors in `switchyard-core`.

use serde::{Deserialize, Serialize};
use switchyard_core::pool::incoming::{DEFAULT_INCOMING_MAX_AGE_SECONDS, DEFAULT_INCOMING_MAX_SIZE};
use switchyard_core::pool::processing::DEFAULT_PROCESSING_MAX_TIMEOUT_SECONDS;
use switchyard_core::pool::sending::{DEFAULT_MAX_RETRIES, DEFAULT_SENDING_MAX_SIZE};
use switchyard_core::{OverflowPolicy, PoolSettings};
use validator::{self, Validate};

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct PoolsConfig {
    #[validate(nested)]
    #[serde(default)]
    pub incoming: IncomingPoolConfig,

    #[validate(nested)]
    #[serde(default)]
    pub processing: ProcessingPoolConfig,

    #[validate(nested)]
    #[serde(default)]
    pub sending: SendingPoolConfig,
}

/// Inbox for freshly accepted events.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct IncomingPoolConfig {
    #[validate(range(min = 1, max = 10_000_000))]
    #[serde(default = "default_incoming_max_size")]
    pub max_size: usize,

    #[serde(default = "default_drop_oldest")]
    pub overflow_policy: OverflowPolicy,

    /// Entries older than this are evicted on the next mutation. `None` disables expiry.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_incoming_max_age")]
    pub max_age_seconds: Option<f64>,
}

impl IncomingPoolConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: Some(self.max_size),
            overflow_policy: self.overflow_policy,
            max_age_seconds: self.max_age_seconds,
        }
    }
}

impl Default for IncomingPoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_incoming_max_size(),
            overflow_policy: default_drop_oldest(),
            max_age_seconds: default_incoming_max_age(),
        }
    }
}

/// In-flight events awaiting domain resolution.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ProcessingPoolConfig {
    /// Ceiling on per-event processing deadlines. `None` trusts each event's own deadline.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_max_timeout")]
    pub max_timeout_seconds: Option<f64>,
}

impl Default for ProcessingPoolConfig {
    fn default() -> Self {
        Self {
            max_timeout_seconds: default_max_timeout(),
        }
    }
}

/// Outbox for replies and emitted events.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SendingPoolConfig {
    #[validate(range(min = 1, max = 10_000_000))]
    #[serde(default = "default_sending_max_size")]
    pub max_size: usize,

    #[serde(default = "default_drop_oldest")]
    pub overflow_policy: OverflowPolicy,

    #[validate(range(max = 100))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[validate(range(exclusive_min = 0.0))]
    #[serde(default)]
    pub max_age_seconds: Option<f64>,
}

impl SendingPoolConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: Some(self.max_size),
            overflow_policy: self.overflow_policy,
            max_age_seconds: self.max_age_seconds,
        }
    }
}

impl Default for SendingPoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_sending_max_size(),
            overflow_policy: default_drop_oldest(),
            max_retries: default_max_retries(),
            max_age_seconds: None,
        }
    }
}

fn default_incoming_max_size() -> usize {
    DEFAULT_INCOMING_MAX_SIZE
}

fn default_incoming_max_age() -> Option<f64> {
    Some(DEFAULT_INCOMING_MAX_AGE_SECONDS)
}

fn default_max_timeout() -> Option<f64> {
    Some(DEFAULT_PROCESSING_MAX_TIMEOUT_SECONDS)
}

fn default_sending_max_size() -> usize {
    DEFAULT_SENDING_MAX_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_drop_oldest() -> OverflowPolicy {
    OverflowPolicy::DropOldest
}
