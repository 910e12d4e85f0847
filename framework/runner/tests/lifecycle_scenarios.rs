mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Failure, FakeEngine, RecordingTransport};
use harness_bridge_model::RunContext;
use harness_bridge_runner::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

struct Harness {
    engine: Arc<FakeEngine>,
    transport: Arc<RecordingTransport>,
    events: LifecycleEvents,
    bridge: HarnessBridge,
}

fn harness(config: BridgeConfig) -> Harness {
    let engine = Arc::new(FakeEngine::default());
    let transport = Arc::new(RecordingTransport::default());
    let events = LifecycleEvents::new();
    let bridge =
        HarnessBridge::install_with_transport(config, engine.clone(), &events, transport.clone())
            .unwrap();

    Harness {
        engine,
        transport,
        events,
        bridge,
    }
}

fn configured(context: RunContext) -> BridgeConfig {
    BridgeConfig::new("http://control-plane", "secret").with_initial_context(context)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn duration_limit_stops_the_run_and_reports_auto_stop() {
    let h = harness(configured(
        RunContext::new("r1")
            .with_tenant_id("t1")
            .with_env_id("e1")
            .with_duration_seconds(Some(5)),
    ));
    let mut stop_listener = h.engine.stop_listener();

    h.events.emit_test_start().await;
    let started_at = tokio::time::Instant::now();
    stop_listener.wait_for_stop().await;
    let elapsed = started_at.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    h.events.emit_test_stop().await;

    assert_eq!(1, h.engine.stop_calls());
    assert_eq!(strings(&["test-start", "test-stop"]), h.transport.calls());

    let start = &h.transport.requests_to("test-start")[0];
    assert_eq!(
        json!({"runId": "r1", "tenantId": "t1", "envId": "e1"}),
        start.body
    );
    assert_eq!(Duration::from_secs(10), start.timeout);

    let stop = &h.transport.requests_to("test-stop")[0];
    assert_eq!(json!("r1"), stop.body["runId"]);
    assert_eq!(json!(true), stop.body["autoStopped"]);
    assert_eq!(Duration::from_secs(5), stop.timeout);
    assert_eq!(LifecycleState::Stopped, h.bridge.coordinator().state().await);
}

#[tokio::test(start_paused = true)]
async fn metrics_are_pushed_every_interval_until_stop() {
    let h = harness(
        configured(RunContext::new("r1")).with_push_interval(Duration::from_secs(1)),
    );

    h.events.emit_test_start().await;
    h.engine.record_requests(7);
    tokio::time::sleep(Duration::from_millis(3500)).await;
    h.events.emit_test_stop().await;

    assert_eq!(
        strings(&["test-start", "metrics", "metrics", "metrics", "test-stop"]),
        h.transport.calls()
    );

    let push = &h.transport.requests_to("metrics")[0];
    assert_eq!(json!("r1"), push.body["runId"]);
    assert_eq!(json!(7), push.body["metrics"]["totalRequests"]);
    assert_eq!(json!(0.0), push.body["metrics"]["errorRate"]);
    assert!(push.body["metrics"]["requestStats"]["GET:/items"].is_object());
    assert!(push.body["metrics"]["requestStats"]
        .get("GET:Aggregated")
        .is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(5, h.transport.started_count());
}

#[tokio::test(start_paused = true)]
async fn manual_stop_before_the_limit_is_not_auto_stopped() {
    let h = harness(configured(
        RunContext::new("r1").with_duration_seconds(Some(30)),
    ));

    h.events.emit_test_start().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    h.events.emit_test_stop().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(0, h.engine.stop_calls());
    let stops = h.transport.requests_to("test-stop");
    assert_eq!(1, stops.len());
    assert_eq!(json!(false), stops[0].body["autoStopped"]);
}

#[tokio::test(start_paused = true)]
async fn server_errors_do_not_interrupt_the_run() {
    let h = harness(
        configured(RunContext::new("r1")).with_push_interval(Duration::from_secs(1)),
    );
    h.transport.fail_with(Some(Failure::Status(500)));

    h.events.emit_test_start().await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    h.events.emit_test_stop().await;

    assert_eq!(
        strings(&["test-start", "metrics", "metrics", "metrics", "test-stop"]),
        h.transport.calls()
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_push_does_not_stop_later_pushes() {
    let h = harness(
        configured(RunContext::new("r1")).with_push_interval(Duration::from_secs(1)),
    );

    h.events.emit_test_start().await;
    h.transport.fail_with(Some(Failure::Timeout));

    // The first push times out after 5s, the next one starts a second later.
    tokio::time::sleep(Duration::from_secs(8)).await;
    h.transport.fail_with(None);
    h.events.emit_test_stop().await;

    assert_eq!(
        strings(&["test-start", "metrics", "metrics", "test-stop"]),
        h.transport.calls()
    );
    assert_eq!(
        Duration::from_secs(5),
        h.transport.requests_to("metrics")[0].timeout
    );
}

#[tokio::test(start_paused = true)]
async fn stop_is_reported_after_a_failed_start() {
    let h = harness(configured(RunContext::new("r1")));
    h.transport.fail_with(Some(Failure::Timeout));

    h.events.emit_test_start().await;
    h.transport.fail_with(None);
    h.events.emit_test_stop().await;

    assert_eq!(strings(&["test-start", "test-stop"]), h.transport.calls());
}

#[tokio::test(start_paused = true)]
async fn unconfigured_integration_makes_no_calls() {
    let h = harness(
        BridgeConfig::default()
            .with_initial_context(RunContext::new("r1").with_duration_seconds(Some(2)))
            .with_push_interval(Duration::from_secs(1)),
    );

    h.events.emit_test_start().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.events.emit_test_stop().await;

    assert!(h.transport.requests().is_empty());
    assert_eq!(0, h.engine.stop_calls());
    assert_eq!(
        SchedulerState::Idle,
        h.bridge.coordinator().scheduler().state()
    );
}

#[tokio::test(start_paused = true)]
async fn missing_run_id_makes_no_calls() {
    let h = harness(
        configured(RunContext::new("").with_duration_seconds(Some(2)))
            .with_push_interval(Duration::from_secs(1)),
    );

    h.events.emit_test_start().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.events.emit_test_stop().await;

    assert!(h.transport.requests().is_empty());
    assert_eq!(0, h.engine.stop_calls());
}

#[tokio::test(start_paused = true)]
async fn context_set_before_start_is_used_for_the_run() {
    let h = harness(configured(RunContext::new("from-env")));
    let endpoint = h.bridge.endpoint();

    assert_eq!(200, endpoint.set_context(br#"{"runId": "first"}"#).status);
    assert_eq!(
        200,
        endpoint
            .set_context(br#"{"runId": "second", "tenantId": "t2"}"#)
            .status
    );

    h.events.emit_test_start().await;
    let rejected = endpoint.set_context(br#"{"runId": "late"}"#);
    assert_eq!(409, rejected.status);
    h.events.emit_test_stop().await;

    assert_eq!(strings(&["second", "second"]), h.transport.run_ids());
    assert_eq!(
        json!("t2"),
        h.transport.requests_to("test-start")[0].body["tenantId"]
    );
    assert_eq!(200, endpoint.set_context(br#"{"runId": "next"}"#).status);
}

#[tokio::test(start_paused = true)]
async fn runs_can_follow_each_other() {
    let h = harness(configured(RunContext::new("r1")));

    h.events.emit_test_start().await;
    h.events.emit_test_start().await;
    h.events.emit_test_stop().await;
    h.events.emit_test_stop().await;

    h.bridge.endpoint().set_context(br#"{"runId": "r2"}"#);
    h.events.emit_test_start().await;
    assert_eq!(LifecycleState::Started, h.bridge.coordinator().state().await);
    h.events.emit_test_stop().await;

    assert_eq!(
        strings(&["test-start", "test-stop", "test-start", "test-stop"]),
        h.transport.calls()
    );
    assert_eq!(strings(&["r1", "r1", "r2", "r2"]), h.transport.run_ids());
}

#[tokio::test]
async fn bridge_subscribes_once() {
    let engine = Arc::new(FakeEngine::default());
    let events = LifecycleEvents::new();

    let _bridge = HarnessBridge::install(BridgeConfig::default(), engine.clone(), &events).unwrap();
    assert_eq!(strings(&[BRIDGE_LISTENER_NAME]), events.subscribers());

    assert!(HarnessBridge::install(BridgeConfig::default(), engine, &events).is_err());
}
