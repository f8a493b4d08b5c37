use switchyard_config::PoolsConfig;
use switchyard_core::{IncomingEventPool, PoolStats, ProcessingEventPool, SendingEventPool};

/// The three pools one listener owns.
#[derive(Debug, Default)]
pub struct PoolSet {
    pub incoming: IncomingEventPool,
    pub processing: ProcessingEventPool,
    pub sending: SendingEventPool,
}

impl PoolSet {
    pub fn from_config(config: &PoolsConfig) -> Self {
        Self {
            incoming: IncomingEventPool::with_settings(config.incoming.settings()),
            processing: ProcessingEventPool::with_max_timeout(
                config.processing.max_timeout_seconds,
            ),
            sending: SendingEventPool::with_settings(
                config.sending.settings(),
                config.sending.max_retries,
            ),
        }
    }

    pub fn stats(&self) -> [PoolStats; 3] {
        [
            self.incoming.stats(),
            self.processing.stats(),
            self.sending.stats(),
        ]
    }
}
