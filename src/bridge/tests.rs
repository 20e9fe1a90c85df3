//! Bridge Module Tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::*;
use crate::config::{BridgeConfig, LinkDirection, LinkRule, OptionValue};
use crate::error::BridgeError;
use crate::external::memory::{MemoryNotificationService, MemoryPubSub, MemoryQueueManager};
use crate::external::{ExternalError, ExternalHandle, ExternalResult};
use crate::ingest::{Ingestion, ManualScheduler, PushRegistration};
use crate::message::Message;
use crate::metrics::{drop_reason, Metrics, Readiness};

/// Handle that counts closes
#[derive(Default)]
struct CountingHandle {
    closes: AtomicUsize,
}

#[async_trait]
impl ExternalHandle for CountingHandle {
    async fn close(&self) -> ExternalResult<()> {
        if self.closes.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(ExternalError::Closed);
        }
        Ok(())
    }
}

type TestCore = BridgeCore<CountingHandle, CountingHandle>;

fn context() -> (BridgeContext, Arc<RecordingSink>, Arc<Metrics>) {
    let sink = Arc::new(RecordingSink::new());
    let metrics = Arc::new(Metrics::new());
    let ctx = BridgeContext::new(sink.clone(), Arc::new(ManualScheduler::new()))
        .with_metrics(metrics.clone());
    (ctx, sink, metrics)
}

fn active_core() -> (TestCore, Arc<RecordingSink>, Arc<Metrics>) {
    let (ctx, sink, metrics) = context();
    let core = TestCore::new("test", ctx);
    core.begin_initialise().unwrap();
    assert!(core.activate(Ingestion::Push(PushRegistration::new())));
    (core, sink, metrics)
}

fn handle() -> Arc<CountingHandle> {
    Arc::new(CountingHandle::default())
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_core_lifecycle() {
    let (ctx, _, metrics) = context();
    let core = TestCore::new("test", ctx);
    assert_eq!(core.state(), BridgeState::Created);

    core.begin_initialise().unwrap();
    assert_eq!(core.state(), BridgeState::Initialising);
    assert!(core.begin_initialise().is_err());

    assert!(core.activate(Ingestion::Push(PushRegistration::new())));
    assert!(core.push_gate().is_some());
    assert_eq!(metrics.bridges_active.get(), 1);

    assert!(core.begin_close());
    assert!(!core.begin_close());
    core.teardown().await;
    core.finish_close();
    assert_eq!(core.state(), BridgeState::Closed);
    assert_eq!(metrics.bridges_active.get(), 0);
    assert!(core.push_gate().is_none());
}

#[tokio::test]
async fn test_activate_refused_after_close_stops_ingestion() {
    let (ctx, _, _) = context();
    let core = TestCore::new("test", ctx);
    core.begin_initialise().unwrap();
    assert!(core.begin_close());

    let registration = PushRegistration::new();
    let gate = registration.gate();
    assert!(!core.activate(Ingestion::Push(registration)));
    assert!(!gate.is_open());
}

#[tokio::test]
async fn test_connect_within_timeout() {
    let (ctx, _, _) = context();
    let core = TestCore::new("test", ctx);

    let result: crate::error::Result<()> = core
        .connect_within("slow:1", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(BridgeError::Connection(_))));

    let result = core
        .connect_within("fast:1", Duration::from_secs(1), async { Ok(7) })
        .await;
    assert_eq!(result.unwrap(), 7);
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_requires_active() {
    let (ctx, _, _) = context();
    let core = TestCore::new("test", ctx);

    let result = core
        .register_sender("local.a", "REMOTE.A", async { Ok(handle()) })
        .await;
    assert!(matches!(result, Err(BridgeError::Link { .. })));
    assert_eq!(core.link_counts(), (0, 0));
}

#[tokio::test]
async fn test_reregister_closes_previous_handle() {
    let (core, _, _) = active_core();
    let first = handle();
    let second = handle();

    core.register_sender("local.a", "REMOTE.A", {
        let first = first.clone();
        async move { Ok(first) }
    })
    .await
    .unwrap();
    core.register_sender("local.a", "REMOTE.B", {
        let second = second.clone();
        async move { Ok(second) }
    })
    .await
    .unwrap();

    assert_eq!(first.closes.load(Ordering::SeqCst), 1);
    assert_eq!(second.closes.load(Ordering::SeqCst), 0);
    assert_eq!(core.link_counts(), (1, 0));

    let (remote, _) = core.outbound_link("local.a").unwrap();
    assert_eq!(remote, "REMOTE.B");
}

#[tokio::test]
async fn test_failed_open_leaves_no_link() {
    let (core, _, _) = active_core();

    let result = core
        .register_receiver("MISSING", "local.a", None, false, async {
            Err(ExternalError::Rejected("unknown object name".to_string()))
        })
        .await;
    match result {
        Err(BridgeError::Link { destination, .. }) => assert_eq!(destination, "MISSING"),
        other => panic!("expected link error, got {:?}", other),
    }
    assert_eq!(core.link_counts(), (0, 0));

    let handoff = core.deliver("MISSING", Message::from_payload("late")).await;
    assert_eq!(handoff, Handoff::Unrouted);
}

#[tokio::test]
async fn test_inbound_mapping_present_while_opening() {
    let (core, sink, _) = active_core();
    let routed = &core;

    core.register_receiver("ORDERS", "local.orders", None, false, async move {
        // A push client may hand over backlog before subscribe returns
        let handoff = routed
            .deliver("ORDERS", Message::from_payload("backlog"))
            .await;
        assert_eq!(handoff, Handoff::Delivered);
        Ok(handle())
    })
    .await
    .unwrap();

    assert_eq!(sink.count(), 1);
    assert_eq!(sink.delivered()[0].0, "local.orders");
}

#[tokio::test]
async fn test_close_during_open_releases_handle() {
    let (core, _, _) = active_core();
    let inbound = handle();
    // Already released elsewhere, so the release below fails and is only logged
    inbound.close().await.unwrap();
    let closing = &core;

    let result = core
        .register_receiver("ORDERS", "local.orders", None, false, {
            let inbound = inbound.clone();
            async move {
                assert!(closing.begin_close());
                Ok(inbound)
            }
        })
        .await;

    assert!(matches!(result, Err(BridgeError::Link { .. })));
    assert_eq!(inbound.closes.load(Ordering::SeqCst), 2);
    assert_eq!(core.link_counts(), (0, 0));
    let handoff = core.deliver("ORDERS", Message::from_payload("late")).await;
    assert_eq!(handoff, Handoff::Unrouted);
}

#[tokio::test]
async fn test_teardown_closes_every_handle_once() {
    let (core, _, metrics) = active_core();
    let out = handle();
    let inbound = handle();

    core.register_sender("local.a", "A", {
        let out = out.clone();
        async move { Ok(out) }
    })
    .await
    .unwrap();
    core.register_receiver("B", "local.b", None, false, {
        let inbound = inbound.clone();
        async move { Ok(inbound) }
    })
    .await
    .unwrap();
    assert_eq!(metrics.links_active.with_label_values(&["test", "in"]).get(), 1);

    assert!(core.begin_close());
    core.teardown().await;
    core.finish_close();

    assert_eq!(out.closes.load(Ordering::SeqCst), 1);
    assert_eq!(inbound.closes.load(Ordering::SeqCst), 1);
    assert_eq!(core.link_counts(), (0, 0));
    assert_eq!(metrics.links_active.with_label_values(&["test", "out"]).get(), 0);
}

// =============================================================================
// Outbound resolution
// =============================================================================

#[tokio::test]
async fn test_outbound_link_missing_counts_drop() {
    let (core, _, metrics) = active_core();

    assert!(core.outbound_link("local.none").is_none());
    assert_eq!(
        metrics
            .messages_dropped
            .with_label_values(&["test", drop_reason::NO_LINK])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_outbound_link_inactive_counts_drop() {
    let (ctx, _, metrics) = context();
    let core = TestCore::new("test", ctx);

    assert!(core.outbound_link("local.a").is_none());
    assert_eq!(
        metrics
            .messages_dropped
            .with_label_values(&["test", drop_reason::INACTIVE])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_exact_link_wins_over_filter() {
    let (core, _, _) = active_core();
    core.register_sender("sensors/#", "ALL.SENSORS", async { Ok(handle()) })
        .await
        .unwrap();
    core.register_sender("sensors/+/temp", "TEMPS", async { Ok(handle()) })
        .await
        .unwrap();
    core.register_sender("sensors/room1/temp", "ROOM1", async { Ok(handle()) })
        .await
        .unwrap();

    assert_eq!(core.outbound_link("sensors/room1/temp").unwrap().0, "ROOM1");
    // First registered matching filter
    assert_eq!(core.outbound_link("sensors/room2/temp").unwrap().0, "ALL.SENSORS");
    assert!(core.has_outbound("sensors"));
    assert!(!core.has_outbound("other/temp"));
}

#[tokio::test]
async fn test_outbound_failed_reasons() {
    let (core, _, metrics) = active_core();

    core.outbound_failed("a", "A", &BridgeError::Translation("bad".to_string()));
    core.outbound_failed("a", "A", &BridgeError::Delivery("down".to_string()));
    core.outbound_sent("a", "A", Instant::now());

    let dropped = |reason| {
        metrics
            .messages_dropped
            .with_label_values(&["test", reason])
            .get()
    };
    assert_eq!(dropped(drop_reason::TRANSLATION), 1);
    assert_eq!(dropped(drop_reason::SEND), 1);
    assert_eq!(metrics.counter(&metrics.messages_sent, "test"), 1);
}

// =============================================================================
// Inbound hand-off
// =============================================================================

#[tokio::test]
async fn test_deliver_routes_through_name_mapping() {
    let (core, sink, metrics) = active_core();
    core.register_receiver("ORDERS", "local.orders", None, false, async { Ok(handle()) })
        .await
        .unwrap();

    let handoff = core.deliver("ORDERS", Message::from_payload("one")).await;
    assert_eq!(handoff, Handoff::Delivered);
    assert_eq!(sink.delivered()[0].0, "local.orders");

    let handoff = core.deliver("UNKNOWN", Message::from_payload("two")).await;
    assert_eq!(handoff, Handoff::Unrouted);
    assert!(handoff.acknowledge());
    assert_eq!(sink.count(), 1);
    assert_eq!(metrics.counter(&metrics.messages_discarded, "test"), 1);

    sink.set_refuse(true);
    let handoff = core.deliver("ORDERS", Message::from_payload("three")).await;
    assert_eq!(handoff, Handoff::Failed);
    assert!(!handoff.acknowledge());
    assert_eq!(metrics.counter(&metrics.handoff_failures, "test"), 1);
}

#[tokio::test]
async fn test_channel_sink_forwards() {
    let (sink, mut rx) = ChannelSink::new();
    sink.inbound("local.a", Message::from_payload("x")).await.unwrap();

    let (destination, message) = rx.recv().await.unwrap();
    assert_eq!(destination, "local.a");
    assert_eq!(message.payload().as_ref(), b"x");

    drop(rx);
    assert!(sink.inbound("local.a", Message::from_payload("y")).await.is_err());
}

// =============================================================================
// Factory and manager
// =============================================================================

fn mq_config(name: &str, links: Vec<LinkRule>) -> BridgeConfig {
    let mut config = BridgeConfig {
        name: name.to_string(),
        kind: crate::config::BridgeKind::QueueManager,
        url: "mq://mq.example.com:1414".to_string(),
        links,
        ..Default::default()
    };
    config
        .options
        .insert("queue_manager".to_string(), OptionValue::String("QM1".to_string()));
    config
}

fn link(local: &str, remote: &str, direction: LinkDirection) -> LinkRule {
    LinkRule {
        local: local.to_string(),
        remote: Some(remote.to_string()),
        direction,
        filter: None,
    }
}

#[test]
fn test_factory_requires_connector() {
    let (ctx, _, _) = context();
    let factory = BridgeFactory::new();

    let result = factory.create(&mq_config("mq", vec![]), ctx);
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[test]
fn test_factory_requires_queue_manager_option() {
    let (ctx, _, _) = context();
    let factory = BridgeFactory::in_memory(
        MemoryNotificationService::new(),
        MemoryQueueManager::new(),
        MemoryPubSub::new(),
    );
    let mut config = mq_config("mq", vec![]);
    config.options.clear();

    assert!(matches!(factory.create(&config, ctx), Err(BridgeError::Config(_))));
}

#[tokio::test]
async fn test_manager_skips_disabled_and_reports_status() {
    let (ctx, _, _) = context();
    let mq = MemoryQueueManager::new();
    mq.define_queue("ORDERS.OUT");
    let factory = BridgeFactory::in_memory(
        MemoryNotificationService::new(),
        mq.clone(),
        MemoryPubSub::new(),
    );

    let mut disabled = mq_config("off", vec![]);
    disabled.enabled = false;
    let configs = vec![
        mq_config("mq", vec![link("local.orders", "ORDERS.OUT", LinkDirection::Out)]),
        disabled,
    ];

    let manager = BridgeManager::from_configs(&configs, &factory, &ctx);
    assert_eq!(manager.bridge_count(), 1);
    assert!(!manager.is_ready());

    manager.start_all().await;
    assert_eq!(manager.active_count(), 1);
    assert!(manager.is_ready());
    assert!(manager.should_forward("local.orders"));
    assert_eq!(
        manager.status(),
        vec![("mq".to_string(), BridgeState::Active)]
    );

    assert_eq!(manager.outbound("local.orders", &Message::from_payload("o")).await, 1);
    assert_eq!(manager.outbound("local.other", &Message::from_payload("o")).await, 0);
    assert_eq!(mq.depth("ORDERS.OUT"), 1);

    manager.stop_all().await;
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.get("mq").unwrap().state(), BridgeState::Closed);
    assert_eq!(mq.open_handles(), 0);
}

#[tokio::test]
async fn test_manager_failed_bridge_does_not_affect_others() {
    let (ctx, _, _) = context();
    let mq = MemoryQueueManager::new();
    mq.define_queue("ORDERS.OUT");
    let factory = BridgeFactory::in_memory(
        MemoryNotificationService::new(),
        mq.clone(),
        MemoryPubSub::new(),
    );

    let configs = vec![
        mq_config(
            "broken-link",
            vec![link("local.x", "NO.SUCH.QUEUE", LinkDirection::Out)],
        ),
        mq_config("mq", vec![link("local.orders", "ORDERS.OUT", LinkDirection::Out)]),
    ];
    let manager = BridgeManager::from_configs(&configs, &factory, &ctx);
    manager.start_all().await;

    assert_eq!(manager.active_count(), 2);
    assert!(!manager.should_forward("local.x"));
    assert!(manager.should_forward("local.orders"));
    manager.stop_all().await;
}
