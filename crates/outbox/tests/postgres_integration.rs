//! PostgreSQL integration tests for the outbox store.
//!
//! These tests need Docker and use a shared PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p outbox --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Duration;
use outbox::{NewOutboxEvent, OutboxStatus, OutboxStore, PostgresOutboxStore};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/002_create_outbox_events.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresOutboxStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE outbox_events RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOutboxStore::new(pool)
}

fn new_event(event_type: &str, aggregate_id: &str) -> NewOutboxEvent {
    NewOutboxEvent::new(event_type, aggregate_id, serde_json::json!({"n": 1}))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn insert_and_claim_roundtrip() {
    let store = get_test_store().await;

    let inserted = store
        .insert(new_event("payment_order.settled", "order-1"))
        .await
        .unwrap();
    assert_eq!(inserted.status, OutboxStatus::New);
    assert!(inserted.claimed_by.is_none());

    let claimed = store.claim_batch("worker-a", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, inserted.id);
    assert_eq!(claimed[0].claimed_by.as_deref(), Some("worker-a"));
    assert_eq!(claimed[0].trace_id, inserted.trace_id);

    // already claimed: invisible to a second claimer
    assert!(store.claim_batch("worker-b", 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn claim_is_id_ordered_and_bounded() {
    let store = get_test_store().await;

    let rows = store
        .insert_batch(vec![
            new_event("a", "agg-1"),
            new_event("b", "agg-2"),
            new_event("c", "agg-3"),
        ])
        .await
        .unwrap();

    let claimed = store.claim_batch("worker-a", 2).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert_eq!(claimed[0].id, rows[0].id);
    assert_eq!(claimed[1].id, rows[1].id);
    assert_eq!(store.count_pending().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn sent_rows_stay_sent() {
    let store = get_test_store().await;

    let row = store.insert(new_event("a", "agg-1")).await.unwrap();
    store.claim_batch("worker-a", 1).await.unwrap();
    store.mark_sent(&[row.id]).await.unwrap();

    store.unclaim(&[row.id]).await.unwrap();
    store.reclaim_stuck(Duration::zero()).await.unwrap();

    let stored = store.get(row.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Sent);
    assert!(store.claim_batch("worker-b", 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn reclaim_frees_only_old_claims() {
    let store = get_test_store().await;

    let stuck = store.insert(new_event("a", "agg-1")).await.unwrap();
    store.claim_batch("dead-worker", 1).await.unwrap();

    // backdate the claim past the threshold
    sqlx::query("UPDATE outbox_events SET claimed_at = now() - interval '10 minutes' WHERE id = $1")
        .bind(stuck.id)
        .execute(store.pool())
        .await
        .unwrap();

    let fresh = store.insert(new_event("b", "agg-2")).await.unwrap();
    store.claim_batch("live-worker", 10).await.unwrap();

    let freed = store.reclaim_stuck(Duration::minutes(5)).await.unwrap();
    assert_eq!(freed, 1);

    let reclaimed = store.claim_batch("worker-b", 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, stuck.id);

    let fresh = store.get(fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.claimed_by.as_deref(), Some("live-worker"));
}
