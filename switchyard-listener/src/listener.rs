//! Listener runtime: lifecycle driving, the accept boundary and resolution of
//! deferred requests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use switchyard_config::SwitchyardConfig;
use switchyard_core::{Event, EventResult, PoolStats};
use switchyard_telemetry::MetricsRecorder;

use crate::dispatcher::Dispatcher;
use crate::error::{HookError, ListenerError};
use crate::hooks::ListenerHooks;
use crate::lifecycle::{LifecycleState, StateMachine};
use crate::pools::PoolSet;
use crate::transport::Transport;

/// Answer given to the caller of the accept boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Acknowledgement {
    Accepted,
    Rejected(RejectReason),
}

impl Acknowledgement {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Acknowledgement::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The listener is not `Started`.
    NotRunning(LifecycleState),
    /// Undecodable body or missing routing fields.
    Malformed(String),
    /// Duplicate timestamp, or dropped by a full drop-newest inbox.
    NotAdmitted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerStats {
    pub state: LifecycleState,
    pub incoming: PoolStats,
    pub processing: PoolStats,
    pub sending: PoolStats,
}

pub struct Listener {
    dispatcher: Arc<Dispatcher>,
    state: Arc<StateMachine>,
    hooks: Arc<dyn ListenerHooks>,
    /// Cancels the current generation of dispatcher loops.
    shutdown: Mutex<CancellationToken>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Listener {
    pub fn new(
        config: &SwitchyardConfig,
        hooks: Arc<dyn ListenerHooks>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ListenerError> {
        Ok(Self::with_metrics(
            config,
            hooks,
            transport,
            Arc::new(MetricsRecorder::new()?),
        ))
    }

    pub fn with_metrics(
        config: &SwitchyardConfig,
        hooks: Arc<dyn ListenerHooks>,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        info!(listener = %config.listener.listener_id, "Creating listener");
        let state = Arc::new(StateMachine::new());
        let dispatcher = Arc::new(Dispatcher::new(
            config.listener.clone(),
            Arc::new(PoolSet::from_config(&config.pools)),
            hooks.clone(),
            transport,
            metrics,
            state.clone(),
        ));
        Self {
            dispatcher,
            state,
            hooks,
            shutdown: Mutex::new(CancellationToken::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.current_state()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn pools(&self) -> &PoolSet {
        self.dispatcher.pools()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        self.dispatcher.metrics()
    }

    /// Drives the listener to `Started` and launches the dispatcher loops.
    ///
    /// Starts from `Uninitialized`, or from `Initializing` after
    /// [`acknowledge_fault`](Self::acknowledge_fault).
    #[instrument(skip(self), fields(listener = %self.dispatcher.config().listener_id))]
    pub async fn start(&self) -> Result<(), ListenerError> {
        if self.state() == LifecycleState::Uninitialized {
            self.enter(LifecycleState::Initializing).await?;
        }
        self.enter(LifecycleState::Starting).await?;
        self.state.change_state(LifecycleState::Started)?;

        let mut tasks = self.tasks.lock();
        if tasks.is_empty() {
            // A previous stop cancelled the old token; loops need a live one.
            let token = CancellationToken::new();
            *self.shutdown.lock() = token.clone();
            *tasks = self.dispatcher.spawn_loops(token);
        }
        info!("Listener started");
        Ok(())
    }

    /// Stops the loops and moves to `Stopped`. Allowed from `Started` and `OnError`.
    #[instrument(skip(self), fields(listener = %self.dispatcher.config().listener_id))]
    pub async fn stop(&self) -> Result<(), ListenerError> {
        self.state.change_state(LifecycleState::Stopping)?;
        let hooked = self.run_hook(LifecycleState::Stopping).await;

        self.shutdown.lock().cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.await?;
        }
        hooked?;

        self.enter(LifecycleState::Stopped).await?;
        info!("Listener stopped");
        Ok(())
    }

    /// Forces `OnError`. Loops idle until the fault is acknowledged and the
    /// listener is started again.
    pub fn fault(&self, reason: &str) -> Result<(), ListenerError> {
        error!(reason, "Listener fault reported");
        self.state.change_state(LifecycleState::OnError)?;
        Ok(())
    }

    /// `OnError → Initializing`, running the initializing hook again.
    pub async fn acknowledge_fault(&self) -> Result<(), ListenerError> {
        self.state.acknowledge_fault()?;
        self.run_hook(LifecycleState::Initializing).await
    }

    /// Decodes and admits an inbound body.
    ///
    /// Malformed bodies are rejected before any pool is touched. A full inbox
    /// under the raise-error policy is the only error returned.
    pub fn accept_json(&self, body: &[u8]) -> Result<Acknowledgement, ListenerError> {
        if let Some(rejection) = self.not_running() {
            return Ok(rejection);
        }
        match Event::from_json(body) {
            Ok(event) => self.admit(event),
            Err(e) => Ok(self.reject(RejectReason::Malformed(e.to_string()))),
        }
    }

    pub fn accept(&self, event: Event) -> Result<Acknowledgement, ListenerError> {
        if let Some(rejection) = self.not_running() {
            return Ok(rejection);
        }
        if let Err(e) = event.validate() {
            return Ok(self.reject(RejectReason::Malformed(e.to_string())));
        }
        self.admit(event)
    }

    /// Queues a domain-originated event for delivery. Fails with
    /// [`ListenerError::OutboundRefused`] or [`ListenerError::Pool`] when the
    /// sending pool does not take it.
    pub fn emit(&self, event: Event) -> Result<(), ListenerError> {
        event.validate()?;
        self.dispatcher.enqueue_outbound(event)
    }

    /// Completes a deferred request: removes it from the processing pool and
    /// queues its reply.
    ///
    /// `Ok(false)` if `key` is not in processing (already resolved or timed
    /// out). An error means the request was taken but its reply was refused
    /// by the sending pool.
    pub fn resolve(&self, key: &str, result: EventResult) -> Result<bool, ListenerError> {
        let Some(meta) = self.pools().processing.pop_by_timestamp(key) else {
            debug!(key, "Nothing to resolve");
            return Ok(false);
        };
        let reply = self.dispatcher.reply_to(meta.event(), result);
        self.dispatcher.enqueue_outbound(reply).map_err(|e| {
            error!(key, error = %e, "Resolved reply dropped");
            e
        })?;
        Ok(true)
    }

    pub fn stats(&self) -> ListenerStats {
        let [incoming, processing, sending] = self.pools().stats();
        ListenerStats {
            state: self.state(),
            incoming,
            processing,
            sending,
        }
    }

    fn admit(&self, event: Event) -> Result<Acknowledgement, ListenerError> {
        let key = event.key();
        match self.pools().incoming.append(event) {
            Ok(true) => {
                self.metrics().events_accepted.inc();
                debug!(key, "Event accepted");
                Ok(Acknowledgement::Accepted)
            }
            Ok(false) => Ok(self.reject(RejectReason::NotAdmitted)),
            Err(e) => {
                self.metrics().events_rejected.inc();
                warn!(key, error = %e, "Inbox full");
                Err(e.into())
            }
        }
    }

    fn not_running(&self) -> Option<Acknowledgement> {
        let state = self.state();
        (!state.is_running()).then(|| self.reject(RejectReason::NotRunning(state)))
    }

    fn reject(&self, reason: RejectReason) -> Acknowledgement {
        self.metrics().events_rejected.inc();
        warn!(?reason, "Event rejected");
        Acknowledgement::Rejected(reason)
    }

    async fn enter(&self, target: LifecycleState) -> Result<(), ListenerError> {
        self.state.change_state(target)?;
        self.run_hook(target).await
    }

    /// Runs the hook bound to `state`; a failure moves the listener to `OnError`.
    async fn run_hook(&self, state: LifecycleState) -> Result<(), ListenerError> {
        let outcome: Result<(), HookError> = match state {
            LifecycleState::Initializing => self.hooks.on_initializing().await,
            LifecycleState::Starting => self.hooks.on_starting().await,
            LifecycleState::Stopping => self.hooks.on_stopping().await,
            LifecycleState::Stopped => self.hooks.on_stopped().await,
            _ => Ok(()),
        };

        outcome.map_err(|source| {
            error!(%state, error = %source, "Lifecycle hook failed");
            if let Err(e) = self.state.change_state(LifecycleState::OnError) {
                warn!(error = %e, "Could not record hook failure");
            }
            ListenerError::Hook { state, source }
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown.get_mut().cancel();
    }
}
