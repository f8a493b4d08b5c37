//! # switchyard-listener
//!
//! Runs one fleet component's event backbone: the lifecycle state machine, the
//! domain hook and transport seams, and the accept/analyze/sweep/send loops that
//! move events between the incoming, processing and sending pools.

pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod listener;
pub mod pools;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::{HookError, LifecycleError, ListenerError, TransportError};
pub use hooks::{AnalyzeOutcome, ListenerHooks};
pub use lifecycle::{LifecycleState, StateMachine};
pub use listener::{Acknowledgement, Listener, ListenerStats, RejectReason};
pub use pools::PoolSet;
pub use transport::{Delivery, LoopbackTransport, Transport};
