//! Listener identity and dispatcher loop pacing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ListenerConfig {
    /// Identifier stamped as `source_id` on replies.
    #[validate(length(min = 1, max = 128))]
    #[serde(default = "default_listener_id")]
    pub listener_id: String,

    #[validate(length(min = 1))]
    #[serde(default = "default_address")]
    pub address: String,

    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Events pulled from the inbox per analyze pass.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_batch_size")]
    pub analyze_batch_size: usize,

    /// Events pulled from the outbox per send pass.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_batch_size")]
    pub send_batch_size: usize,

    /// Idle wait of the analyze and send loops when their pool is empty.
    #[validate(range(min = 1, max = 60_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[validate(range(min = 10, max = 3_600_000))]
    #[serde(default = "default_local_check_interval_ms")]
    pub local_check_interval_ms: u64,

    #[validate(range(min = 10, max = 3_600_000))]
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn local_check_interval(&self) -> Duration {
        Duration::from_millis(self.local_check_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_listener_id() -> String {
    "switchyard".into()
}

fn default_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_batch_size() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_local_check_interval_ms() -> u64 {
    1_000
}

fn default_sweep_interval_ms() -> u64 {
    500
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listener_id: default_listener_id(),
            address: default_address(),
            port: default_port(),
            analyze_batch_size: default_batch_size(),
            send_batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            local_check_interval_ms: default_local_check_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}
