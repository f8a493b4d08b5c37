mod common;

use std::sync::Arc;
use std::time::Duration;

use switchyard_config::{ListenerConfig, PoolsConfig};
use switchyard_core::events::TIMEOUT_ERROR_CODE;
use switchyard_core::{Destination, EventResult, Outcome, OverflowPolicy};
use switchyard_listener::{
    Dispatcher, LifecycleState, ListenerHooks, LoopbackTransport, PoolSet, StateMachine,
};
use switchyard_telemetry::MetricsRecorder;
use tracing_test::traced_test;

use common::{hooks, notice, request};

fn started_state() -> Arc<StateMachine> {
    let state = Arc::new(StateMachine::new());
    for next in [
        LifecycleState::Initializing,
        LifecycleState::Starting,
        LifecycleState::Started,
    ] {
        state.change_state(next).unwrap();
    }
    state
}

fn dispatcher_with(
    pools: PoolsConfig,
    hooks: Arc<dyn ListenerHooks>,
    transport: Arc<LoopbackTransport>,
) -> Dispatcher {
    Dispatcher::new(
        ListenerConfig::default(),
        Arc::new(PoolSet::from_config(&pools)),
        hooks,
        transport,
        Arc::new(MetricsRecorder::new().unwrap()),
        started_state(),
    )
}

fn dispatcher() -> Dispatcher {
    dispatcher_with(
        PoolsConfig::default(),
        hooks(),
        Arc::new(LoopbackTransport::reliable()),
    )
}

#[tokio::test]
async fn analyze_replies_to_requests_with_reversed_routing() {
    let d = dispatcher();
    let req = request("capture", 8101);
    d.pools().incoming.append(req.clone()).unwrap();

    assert_eq!(d.analyze_once().await, 1);
    assert!(d.pools().incoming.is_empty());

    let reply = d.pools().sending.peek_oldest().unwrap().into_event();
    assert_eq!(reply.destination(), Destination::new("10.0.0.5", 8101));
    assert_eq!(reply.source_id, "switchyard");
    assert_eq!(reply.correlation_id, Some(req.key()));
    assert!(reply.result.unwrap().is_success());
    assert_eq!(d.metrics().replies_enqueued.get(), 1);
}

#[tokio::test]
async fn deferred_requests_wait_in_processing() {
    let d = dispatcher();
    d.pools().incoming.append(request("slow", 8101)).unwrap();
    d.pools().incoming.append(notice(8102)).unwrap();

    assert_eq!(d.analyze_once().await, 2);
    assert_eq!(d.pools().processing.len(), 1);
    assert!(d.pools().processing.peek_oldest().unwrap().event().is_processing);
    assert!(d.pools().sending.is_empty());
}

#[tokio::test]
async fn deferred_notice_is_not_tracked() {
    let d = dispatcher();
    let mut slow_notice = notice(8102);
    slow_notice.event_type = "slow".into();
    d.pools().incoming.append(slow_notice).unwrap();

    d.analyze_once().await;
    assert!(d.pools().processing.is_empty());
    assert!(d.pools().sending.is_empty());
}

#[tokio::test]
async fn analyze_failure_answers_requests_with_an_error() {
    let d = dispatcher();
    d.pools().incoming.append(request("broken", 8101)).unwrap();

    d.analyze_once().await;
    let result = d.pools().sending.peek_oldest().unwrap().into_event().result.unwrap();
    assert_eq!(result.outcome, Outcome::Error);
    assert_eq!(result.error_message.as_deref(), Some("cannot parse payload"));
}

#[tokio::test]
#[traced_test]
async fn replies_refused_by_a_full_outbox_are_counted() {
    let mut pools = PoolsConfig::default();
    pools.sending.max_size = 1;
    pools.sending.overflow_policy = OverflowPolicy::RaiseError;
    let d = dispatcher_with(pools, hooks(), Arc::new(LoopbackTransport::reliable()));
    d.pools().incoming.append(request("capture", 8101)).unwrap();
    d.pools().incoming.append(request("capture", 8102)).unwrap();

    assert_eq!(d.analyze_once().await, 2);
    assert_eq!(d.pools().sending.len(), 1);
    assert_eq!(d.metrics().replies_enqueued.get(), 1);
    assert_eq!(d.metrics().replies_dropped.get(), 1);
    assert!(logs_contain("Outbound event dropped"));
}

#[tokio::test]
#[traced_test]
async fn sweep_turns_timeouts_into_failure_replies() {
    let d = dispatcher();
    d.pools()
        .processing
        .append(request("slow", 8101).with_max_processing_time(0.05))
        .unwrap();
    d.pools().processing.append(request("slow", 8102)).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(d.sweep_once().await, 1);

    assert_eq!(d.pools().processing.len(), 1);
    let reply = d.pools().sending.peek_oldest().unwrap().into_event();
    assert_eq!(reply.destination(), Destination::new("10.0.0.5", 8101));
    let result = reply.result.unwrap();
    assert_eq!(result.outcome, Outcome::Failure);
    assert_eq!(result.error_code, Some(TIMEOUT_ERROR_CODE));
    assert_eq!(d.metrics().processing_timeouts.get(), 1);
    assert!(logs_contain("processing_timeout"));
}

#[tokio::test]
async fn send_delivers_every_destination_group() {
    let transport = Arc::new(LoopbackTransport::reliable());
    let d = dispatcher_with(PoolsConfig::default(), hooks(), transport.clone());
    for port in [9001, 9002, 9001] {
        let reply = request("capture", port).reply(EventResult::success());
        d.pools().sending.append(reply).unwrap();
    }

    assert_eq!(d.send_once().await, 3);
    assert!(d.pools().sending.is_empty());
    assert_eq!(transport.delivered_count(), 3);
    assert_eq!(d.metrics().deliveries.get(), 3);
}

#[tokio::test]
#[traced_test]
async fn failing_destination_is_retried_then_abandoned() {
    let transport = Arc::new(LoopbackTransport::reliable());
    transport.fail_destination(Destination::new("10.0.0.5", 9001));
    let mut pools = PoolsConfig::default();
    pools.sending.max_retries = 2;
    let d = dispatcher_with(pools, hooks(), transport.clone());

    let to_a = |port| request("capture", port).reply(EventResult::success());
    d.pools().sending.append(to_a(9001)).unwrap();
    d.pools().sending.append(to_a(9001)).unwrap();
    d.pools().sending.append(to_a(9002)).unwrap();

    let mut passes = 0;
    while !d.pools().sending.is_empty() {
        d.send_once().await;
        passes += 1;
        assert!(passes < 10, "sending pool never drained");
    }

    let m = d.metrics();
    assert_eq!(transport.delivered_count(), 1);
    assert_eq!(m.deliveries.get(), 1);
    // Two events, one first attempt plus two retries each.
    assert_eq!(m.delivery_failures.get(), 6);
    assert_eq!(m.deliveries_abandoned.get(), 2);
    assert!(logs_contain("Delivery abandoned after retries"));
}
