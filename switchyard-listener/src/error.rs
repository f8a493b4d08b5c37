use thiserror::Error;
use tokio::task::JoinError;

use switchyard_core::{EventError, PoolError};

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("No fault to acknowledge, listener is {0}")]
    NotFaulted(LifecycleState),
}

/// Failure reported by a domain hook.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HookError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        HookError(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Destination {0} unreachable")]
    Unreachable(String),

    #[error("Destination {destination} refused the event: {reason}")]
    Refused { destination: String, reason: String },

    #[error("Failed to encode event: {0}")]
    Encode(#[from] EventError),
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{state} hook failed: {source}")]
    Hook {
        state: LifecycleState,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Sending pool refused outbound event {0}")]
    OutboundRefused(String),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("Dispatcher task failed: {0}")]
    Task(String),

    #[error("Metrics setup failed: {0}")]
    Telemetry(#[from] switchyard_telemetry::TelemetryError),
}

impl From<JoinError> for ListenerError {
    fn from(err: JoinError) -> Self {
        ListenerError::Task(err.to_string())
    }
}
