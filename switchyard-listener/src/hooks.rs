//! Domain seam of a listener.

use async_trait::async_trait;
use switchyard_core::{Event, EventResult};

use crate::error::HookError;

/// Decision of the domain about one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    /// Answer now: a reply carrying this result is queued for the sender.
    Reply(EventResult),
    /// Work continues elsewhere; a request is parked in the processing pool
    /// until [`Listener::resolve`](crate::Listener::resolve) or its deadline.
    Defer,
    /// Nothing to send.
    Done,
}

/// Behavior a component plugs into the listener.
///
/// Lifecycle hooks run once on entry to their state; an error moves the
/// listener to `OnError`. Every method has a no-op default.
#[async_trait]
pub trait ListenerHooks: Send + Sync {
    async fn on_initializing(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_starting(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_stopping(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_stopped(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn analyze(&self, _event: &Event) -> Result<AnalyzeOutcome, HookError> {
        Ok(AnalyzeOutcome::Done)
    }

    /// Periodic poll of component-local state.
    async fn local_check(&self) -> Result<(), HookError> {
        Ok(())
    }
}
