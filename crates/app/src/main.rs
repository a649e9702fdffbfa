//! Settlement platform entry point.

mod config;
mod publisher;

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use balances::{BalanceService, InMemoryBalanceCache, PostgresSnapshotStore};
use outbox::{
    BacklogGauge, BacklogResync, Dispatcher, DispatcherConfig, ExpanderRegistry, LineItemExpander,
    PostgresOutboxStore, Reclaimer,
};

use crate::config::Config;
use crate::publisher::LogPublisher;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");

    // 2. Install Prometheus metrics exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .expect("failed to install Prometheus exporter");

    // 3. Connect to Postgres and run migrations
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    // 4. Wire the outbox dispatcher
    let outbox_store = Arc::new(PostgresOutboxStore::new(pool.clone()));
    let publisher = Arc::new(LogPublisher);
    let backlog = BacklogGauge::new();

    let mut expanders = ExpanderRegistry::new();
    expanders.register("payment_order.created", Box::new(LineItemExpander));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&outbox_store),
        publisher,
        Arc::new(expanders),
        backlog.clone(),
        DispatcherConfig {
            workers: config.outbox_workers,
            poll_interval: config.outbox_poll_interval,
            batch_size: config.outbox_batch_size,
            ..DispatcherConfig::default()
        },
    ));

    let resync = BacklogResync::new(
        Arc::clone(&outbox_store),
        backlog.clone(),
        config.backlog_resync_interval,
    );
    let pending = resync
        .resync_once()
        .await
        .expect("initial backlog count failed");
    tracing::info!(pending, workers = config.outbox_workers, "starting outbox dispatcher");

    let mut tasks = dispatcher.spawn_workers();
    tasks.push(resync.spawn());
    tasks.push(
        Reclaimer::new(
            Arc::clone(&outbox_store),
            config.stuck_claim_threshold,
            config.reclaim_interval,
        )
        .spawn(),
    );

    // 5. Periodic balance merge
    let balances = Arc::new(BalanceService::new(
        InMemoryBalanceCache::new(),
        PostgresSnapshotStore::new(pool.clone()),
    ));
    let merge_interval = config.balance_merge_interval;
    tasks.push(tokio::spawn({
        let balances = Arc::clone(&balances);
        async move {
            let mut ticker = tokio::time::interval(merge_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(error) = balances.merge_dirty().await {
                    tracing::warn!(%error, "periodic balance merge failed");
                }
            }
        }
    }));

    // 6. Run until a shutdown signal arrives
    shutdown_signal().await;
    for task in &tasks {
        task.abort();
    }
    // final merge so cached deltas reach the durable snapshots
    if let Err(error) = balances.merge_dirty().await {
        tracing::warn!(%error, "final balance merge failed");
    }
    pool.close().await;
    tracing::info!("shut down gracefully");
}
