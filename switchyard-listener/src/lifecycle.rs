//! Listener lifecycle.
//!
//! ```text
//! Uninitialized → Initializing → Starting → Started → Stopping → Stopped
//!                      ↑              ↓         ↓          ↓
//!                      └─ (ack) ── OnError ←────┴──────────┘
//! ```
//!
//! `OnError` is reachable from every state except `Stopped`. Leaving it requires
//! [`StateMachine::acknowledge_fault`] (back to `Initializing`) or a shutdown
//! (`Stopping`). Plain [`StateMachine::change_state`] never leaves `OnError`
//! for `Initializing`.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initializing,
    Starting,
    /// The only state in which the dispatcher loops pull from the pools.
    Started,
    Stopping,
    Stopped,
    OnError,
}

impl LifecycleState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::OnError)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Whether `self → to` is allowed through [`StateMachine::change_state`].
    pub fn can_transition_to(&self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        match (*self, to) {
            (Uninitialized, Initializing)
            | (Initializing, Starting)
            | (Starting, Started)
            | (Started, Stopping)
            | (Stopping, Stopped)
            | (OnError, Stopping) => true,
            (from, OnError) => !from.is_terminal() && !from.is_error(),
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Starting => write!(f, "starting"),
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::OnError => write!(f, "on_error"),
        }
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uninitialized" => Ok(Self::Uninitialized),
            "initializing" => Ok(Self::Initializing),
            "starting" => Ok(Self::Starting),
            "started" => Ok(Self::Started),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "on_error" => Ok(Self::OnError),
            _ => Err(format!("Invalid lifecycle state: {s}")),
        }
    }
}

/// Lock-guarded current state. Hooks are run by the caller after a successful
/// transition, never while the lock is held.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: Mutex<LifecycleState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Moves to `new_state`, returning the state it left.
    pub fn change_state(
        &self,
        new_state: LifecycleState,
    ) -> Result<LifecycleState, LifecycleError> {
        let mut state = self.state.lock();
        let from = *state;
        if !from.can_transition_to(new_state) {
            warn!(%from, to = %new_state, "Rejected lifecycle transition");
            return Err(LifecycleError::InvalidTransition {
                from,
                to: new_state,
            });
        }
        *state = new_state;
        if new_state.is_error() {
            warn!(%from, "Listener entered on_error");
        } else {
            debug!(%from, to = %new_state, "Lifecycle transition");
        }
        Ok(from)
    }

    /// Clears a fault: `OnError → Initializing`.
    pub fn acknowledge_fault(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        if !state.is_error() {
            return Err(LifecycleError::NotFaulted(*state));
        }
        *state = LifecycleState::Initializing;
        info!("Fault acknowledged, re-initializing");
        Ok(())
    }
}
