//! Dispatcher behaviour against the in-memory store and publisher.

use std::sync::Arc;

use chrono::Duration;
use common::InMemoryEventPublisher;
use outbox::{
    BacklogGauge, Dispatcher, DispatcherConfig, ExpanderRegistry, InMemoryOutboxStore,
    LineItemExpander, NewOutboxEvent, OutboxStatus, OutboxStore, Reclaimer,
};

fn dispatcher(
    store: Arc<InMemoryOutboxStore>,
    publisher: Arc<InMemoryEventPublisher>,
    expanders: ExpanderRegistry,
) -> Dispatcher<InMemoryOutboxStore, InMemoryEventPublisher> {
    Dispatcher::new(
        store,
        publisher,
        Arc::new(expanders),
        BacklogGauge::new(),
        DispatcherConfig::default(),
    )
}

fn order_event(aggregate_id: &str) -> NewOutboxEvent {
    NewOutboxEvent::new(
        "payment_order.settled",
        aggregate_id,
        serde_json::json!({"amount": 10000}),
    )
}

#[tokio::test]
async fn delivered_rows_are_marked_sent() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let dispatcher = dispatcher(store.clone(), publisher.clone(), ExpanderRegistry::new());

    let row = store.insert(order_event("order-1")).await.unwrap();

    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(publisher.published_count(), 1);

    let stored = store.get(row.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Sent);
}

#[tokio::test]
async fn competing_workers_never_share_rows() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let config = DispatcherConfig {
        batch_size: 3,
        ..DispatcherConfig::default()
    };
    let dispatcher = Dispatcher::new(
        store.clone(),
        publisher.clone(),
        Arc::new(ExpanderRegistry::new()),
        BacklogGauge::new(),
        config,
    );

    for i in 0..6 {
        store.insert(order_event(&format!("order-{i}"))).await.unwrap();
    }

    let (a, b) = tokio::join!(
        dispatcher.poll_once("worker-a"),
        dispatcher.poll_once("worker-b"),
    );
    assert_eq!(a.unwrap() + b.unwrap(), 6);
    // each row delivered exactly once
    assert_eq!(publisher.published_count(), 6);
}

#[tokio::test]
async fn batch_failure_releases_rows_for_retry() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let backlog = BacklogGauge::new();
    let dispatcher = Dispatcher::new(
        store.clone(),
        publisher.clone(),
        Arc::new(ExpanderRegistry::new()),
        backlog.clone(),
        DispatcherConfig::default(),
    );

    store.insert(order_event("order-1")).await.unwrap();
    store.insert(order_event("order-2")).await.unwrap();
    backlog.set(2);

    publisher.set_fail_all(true);
    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 0);
    assert_eq!(publisher.published_count(), 0);
    assert_eq!(store.count_pending().await.unwrap(), 2);
    assert_eq!(backlog.get(), 2);

    // bus recovers: the same rows go out on the next poll
    publisher.clear_failures();
    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 2);
    assert_eq!(publisher.published_count(), 2);
}

#[tokio::test]
async fn per_row_failure_only_releases_that_row() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let dispatcher = dispatcher(store.clone(), publisher.clone(), ExpanderRegistry::new());

    let good = store.insert(order_event("order-1")).await.unwrap();
    let bad = store
        .insert(NewOutboxEvent::new(
            "payment_order.failed",
            "order-2",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    publisher.set_fail_event_type("payment_order.failed");
    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 1);

    let good = store.get(good.id).await.unwrap().unwrap();
    assert_eq!(good.status, OutboxStatus::Sent);

    let bad = store.get(bad.id).await.unwrap().unwrap();
    assert_eq!(bad.status, OutboxStatus::New);
    assert!(bad.claimed_by.is_none());
}

#[tokio::test]
async fn expansion_inserts_children_before_publish() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let mut expanders = ExpanderRegistry::new();
    expanders.register("payment_order.created", Box::new(LineItemExpander));
    let dispatcher = dispatcher(store.clone(), publisher.clone(), expanders);

    store
        .insert(NewOutboxEvent::new(
            "payment_order.created",
            "order-1",
            serde_json::json!({"line_items": [{"sku": "a"}, {"sku": "b"}]}),
        ))
        .await
        .unwrap();

    // first poll delivers the parent and enqueues two children
    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(store.count_pending().await.unwrap(), 2);

    // second poll delivers the children
    let sent = dispatcher.poll_once("worker-0").await.unwrap();
    assert_eq!(sent, 2);

    let children = publisher.published_of_type("payment_order.line_item.created");
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].aggregate_id, "order-1:0");
    assert_eq!(children[1].aggregate_id, "order-1:1");
}

#[tokio::test]
async fn reclaimer_frees_rows_from_a_dead_worker() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let dispatcher = dispatcher(store.clone(), publisher.clone(), ExpanderRegistry::new());

    let row = store.insert(order_event("order-1")).await.unwrap();

    // a worker claims and then dies before publishing
    store.claim_batch("dead-worker", 10).await.unwrap();
    assert_eq!(dispatcher.poll_once("worker-0").await.unwrap(), 0);

    // not yet past the threshold: nothing to free
    let reclaimer = Reclaimer::new(
        store.clone(),
        Duration::minutes(5),
        std::time::Duration::from_secs(60),
    );
    assert_eq!(reclaimer.reclaim_once().await.unwrap(), 0);

    // claim older than the threshold gets released and redelivered
    let zero_threshold = Reclaimer::new(
        store.clone(),
        Duration::zero(),
        std::time::Duration::from_secs(60),
    );
    assert_eq!(zero_threshold.reclaim_once().await.unwrap(), 1);

    assert_eq!(dispatcher.poll_once("worker-0").await.unwrap(), 1);
    let stored = store.get(row.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Sent);
}
