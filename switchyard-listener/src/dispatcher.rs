//! Loop bodies that move events between the pools.
//!
//! Each body is callable once (`*_once`) and is also driven periodically by a
//! tokio task spawned from [`Dispatcher::spawn_loops`]. Bodies only run while the
//! listener is `Started`. Pool locks are released before any hook or transport
//! call is awaited.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use switchyard_config::ListenerConfig;
use switchyard_core::{Event, EventResult, Requeue};
use switchyard_telemetry::{EventLogger, MetricsRecorder};

use crate::error::ListenerError;
use crate::hooks::{AnalyzeOutcome, ListenerHooks};
use crate::lifecycle::StateMachine;
use crate::pools::PoolSet;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Analyze,
    LocalCheck,
    Sweep,
    Send,
}

impl LoopKind {
    fn name(self) -> &'static str {
        match self {
            LoopKind::Analyze => "analyze",
            LoopKind::LocalCheck => "local_check",
            LoopKind::Sweep => "processing_sweep",
            LoopKind::Send => "send",
        }
    }
}

pub struct Dispatcher {
    config: ListenerConfig,
    pools: Arc<PoolSet>,
    hooks: Arc<dyn ListenerHooks>,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRecorder>,
    state: Arc<StateMachine>,
}

impl Dispatcher {
    pub fn new(
        config: ListenerConfig,
        pools: Arc<PoolSet>,
        hooks: Arc<dyn ListenerHooks>,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsRecorder>,
        state: Arc<StateMachine>,
    ) -> Self {
        Self {
            config,
            pools,
            hooks,
            transport,
            metrics,
            state,
        }
    }

    pub fn pools(&self) -> &PoolSet {
        &self.pools
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Reply to `request` sent on behalf of this listener.
    pub fn reply_to(&self, request: &Event, result: EventResult) -> Event {
        let mut reply = request.reply(result);
        reply.source_id = self.config.listener_id.clone();
        reply
    }

    /// Queues an outbound event. A refusal by the sending pool is counted as a
    /// dropped reply and returned to the caller.
    pub fn enqueue_outbound(&self, event: Event) -> Result<(), ListenerError> {
        let key = event.key();
        let refused = match self.pools.sending.append(event) {
            Ok(true) => {
                self.metrics.replies_enqueued.inc();
                return Ok(());
            }
            Ok(false) => ListenerError::OutboundRefused(key),
            Err(e) => ListenerError::Pool(e),
        };
        self.metrics.replies_dropped.inc();
        Err(refused)
    }

    fn forward(&self, event: Event) {
        if let Err(e) = self.enqueue_outbound(event) {
            error!(error = %e, "Outbound event dropped");
        }
    }

    /// Drains one batch from the incoming pool through the `analyze` hook.
    /// Returns the number of events taken.
    #[instrument(skip(self), level = "debug")]
    pub async fn analyze_once(&self) -> usize {
        let batch = self.pools.incoming.pop_batch(self.config.analyze_batch_size);
        let taken = batch.len();

        for meta in batch {
            let mut event = meta.into_event();
            match self.hooks.analyze(&event).await {
                Ok(AnalyzeOutcome::Reply(result)) => {
                    self.forward(self.reply_to(&event, result));
                }
                Ok(AnalyzeOutcome::Defer) if event.to_be_processed => {
                    let key = event.key();
                    event.is_processing = true;
                    match self.pools.processing.append(event) {
                        Ok(true) => trace!(key, "Deferred to processing"),
                        Ok(false) => warn!(key, "Event already in processing"),
                        Err(e) => error!(key, error = %e, "Processing pool refused event"),
                    }
                }
                Ok(AnalyzeOutcome::Defer) => {
                    debug!(key = event.key(), "Deferred fire-and-forget event, nothing to track");
                }
                Ok(AnalyzeOutcome::Done) => {}
                Err(e) => {
                    warn!(key = event.key(), error = %e, "Analyze hook failed");
                    if event.to_be_processed {
                        let result = EventResult::error(None, e.to_string());
                        self.forward(self.reply_to(&event, result));
                    }
                }
            }
        }
        taken
    }

    /// Converts every timed-out processing entry into a timeout reply and
    /// evicts expired entries from the other pools. Returns the number of timeouts.
    #[instrument(skip(self), level = "debug")]
    pub async fn sweep_once(&self) -> usize {
        let timed_out = self.pools.processing.take_timed_out();

        for meta in &timed_out {
            let limit = self.pools.processing.deadline_for(meta);
            let request = meta.event();
            self.metrics.processing_timeouts.inc();
            EventLogger::log_event(
                "processing_timeout",
                vec![
                    KeyValue::new("key", meta.timestamp_key().to_owned()),
                    KeyValue::new("source", request.source().to_string()),
                    KeyValue::new("limit_seconds", limit),
                ],
            )
            .await;

            let mut reply = request.timeout_reply(limit);
            reply.source_id = self.config.listener_id.clone();
            self.forward(reply);
        }

        let expired = self.pools.incoming.cleanup_expired() + self.pools.sending.cleanup_expired();
        if expired > 0 {
            debug!(expired, "Evicted expired entries");
        }
        self.record_pool_sizes();
        timed_out.len()
    }

    /// Pops one grouped batch from the sending pool and delivers it. Failed
    /// deliveries go back through the retry ceiling. Returns the number of
    /// events attempted.
    #[instrument(skip(self), level = "debug")]
    pub async fn send_once(&self) -> usize {
        let groups = self.pools.sending.pop_batch_grouped(self.config.send_batch_size);
        let mut attempted = 0;

        for (destination, batch) in groups {
            let timer = self.metrics.delivery_latency.start_timer();
            for meta in batch {
                attempted += 1;
                let outcome = self.transport.deliver(meta.event()).await;
                let Err(e) = outcome else {
                    self.metrics.deliveries.inc();
                    continue;
                };

                self.metrics.delivery_failures.inc();
                debug!(%destination, error = %e, "Delivery failed");
                match self.pools.sending.requeue_failed(meta) {
                    Ok(Requeue::Retrying(meta)) => {
                        trace!(
                            key = meta.timestamp_key(),
                            retry_count = meta.retry_count,
                            "Requeued"
                        );
                    }
                    Ok(Requeue::Abandoned(event)) => {
                        self.metrics.deliveries_abandoned.inc();
                        error!(
                            %destination,
                            key = event.key(),
                            "Delivery abandoned after retries"
                        );
                        EventLogger::log_event(
                            "delivery_abandoned",
                            vec![
                                KeyValue::new("key", event.key()),
                                KeyValue::new("destination", destination.to_string()),
                                KeyValue::new("event_type", event.event_type.clone()),
                            ],
                        )
                        .await;
                    }
                    Ok(Requeue::Rejected(event)) => {
                        self.metrics.replies_dropped.inc();
                        warn!(%destination, key = event.key(), "Sending pool refused requeue");
                    }
                    Err(e) => {
                        self.metrics.replies_dropped.inc();
                        error!(%destination, error = %e, "Requeue lost to overflow");
                    }
                }
            }
            timer.observe_duration();
        }
        attempted
    }

    pub async fn local_check_once(&self) {
        if let Err(e) = self.hooks.local_check().await {
            warn!(error = %e, "Local check failed");
        }
    }

    /// Spawns the analyze, local-check, sweep and send loops. They run until
    /// `token` is cancelled.
    pub fn spawn_loops(self: &Arc<Self>, token: CancellationToken) -> Vec<JoinHandle<()>> {
        [
            (LoopKind::Analyze, self.config.poll_interval()),
            (LoopKind::LocalCheck, self.config.local_check_interval()),
            (LoopKind::Sweep, self.config.sweep_interval()),
            (LoopKind::Send, self.config.poll_interval()),
        ]
        .into_iter()
        .map(|(kind, interval)| tokio::spawn(self.clone().run_loop(kind, interval, token.clone())))
        .collect()
    }

    async fn step(&self, kind: LoopKind) -> usize {
        match kind {
            LoopKind::Analyze => self.analyze_once().await,
            LoopKind::Send => self.send_once().await,
            // Periodic loops always wait a full interval.
            LoopKind::Sweep => {
                self.sweep_once().await;
                0
            }
            LoopKind::LocalCheck => {
                self.local_check_once().await;
                0
            }
        }
    }

    async fn run_loop(
        self: Arc<Self>,
        kind: LoopKind,
        interval: Duration,
        token: CancellationToken,
    ) {
        debug!(task = kind.name(), ?interval, "Dispatcher loop started");
        while !token.is_cancelled() {
            let worked = if self.state.current_state().is_running() {
                self.step(kind).await
            } else {
                0
            };

            if worked > 0 {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
        debug!(task = kind.name(), "Dispatcher loop stopped");
    }

    fn record_pool_sizes(&self) {
        for stats in self.pools.stats() {
            self.metrics.set_pool_size(&stats.name, stats.size);
        }
    }
}
