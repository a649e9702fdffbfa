//! Outbox worker pool.

use std::sync::Arc;
use std::time::Duration;

use common::publish::EventPublisher;

use crate::backlog::BacklogGauge;
use crate::error::Result;
use crate::event::OutboxEvent;
use crate::expand::ExpanderRegistry;
use crate::store::OutboxStore;

/// Tuning for the dispatcher worker pool.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of competing workers.
    pub workers: usize,
    /// How often each worker polls for claimable rows.
    pub poll_interval: Duration,
    /// Maximum rows claimed per poll.
    pub batch_size: u32,
    /// Per-worker startup offset so workers don't poll in lockstep.
    pub startup_stagger: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(500),
            batch_size: 50,
            startup_stagger: Duration::from_millis(50),
        }
    }
}

/// Pulls claimed rows through expand → publish → acknowledge.
///
/// Acknowledgement is per row: only rows the bus confirmed are marked
/// SENT; a batch-level transport error releases the whole claim, a
/// per-row failure releases just that row. Rows released here are
/// retried on a later poll, by any worker.
pub struct Dispatcher<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
    expanders: Arc<ExpanderRegistry>,
    backlog: BacklogGauge,
    config: DispatcherConfig,
}

impl<S, P> Dispatcher<S, P>
where
    S: OutboxStore + 'static,
    P: EventPublisher + 'static,
{
    /// Creates a new dispatcher.
    pub fn new(
        store: Arc<S>,
        publisher: Arc<P>,
        expanders: Arc<ExpanderRegistry>,
        backlog: BacklogGauge,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            expanders,
            backlog,
            config,
        }
    }

    /// Runs one claim/expand/publish/acknowledge cycle for `worker_id`,
    /// returning the number of rows delivered.
    #[tracing::instrument(skip(self))]
    pub async fn poll_once(&self, worker_id: &str) -> Result<usize> {
        let claimed = self
            .store
            .claim_batch(worker_id, self.config.batch_size)
            .await?;
        if claimed.is_empty() {
            return Ok(0);
        }
        self.backlog.sub(claimed.len() as u64);
        metrics::counter!("outbox_events_claimed_total").increment(claimed.len() as u64);

        let mut publishable = Vec::with_capacity(claimed.len());
        for row in claimed {
            match self.expand_row(&row).await {
                Ok(()) => publishable.push(row),
                Err(error) => {
                    tracing::warn!(row_id = row.id, %error, "expansion failed, releasing row");
                    metrics::counter!("outbox_expansion_failures_total").increment(1);
                    self.release(&[row.id]).await?;
                }
            }
        }
        if publishable.is_empty() {
            return Ok(0);
        }

        let envelopes: Vec<_> = publishable.iter().map(OutboxEvent::to_envelope).collect();
        let outcomes = match self.publisher.publish_batch(&envelopes).await {
            Ok(outcomes) => outcomes,
            Err(error) => {
                // transport-level failure: nothing was delivered
                tracing::warn!(%error, "batch publish failed, releasing claim");
                metrics::counter!("outbox_batch_publish_failures_total").increment(1);
                let ids: Vec<i64> = publishable.iter().map(|r| r.id).collect();
                self.release(&ids).await?;
                return Ok(0);
            }
        };

        let mut sent_ids = Vec::new();
        let mut failed_ids = Vec::new();
        for (row, outcome) in publishable.iter().zip(&outcomes) {
            if outcome.is_confirmed() {
                sent_ids.push(row.id);
            } else {
                tracing::warn!(
                    row_id = row.id,
                    event_type = row.event_type,
                    ?outcome,
                    "publish not confirmed, releasing row"
                );
                failed_ids.push(row.id);
            }
        }

        if !sent_ids.is_empty() {
            self.store.mark_sent(&sent_ids).await?;
            metrics::counter!("outbox_events_sent_total").increment(sent_ids.len() as u64);
        }
        if !failed_ids.is_empty() {
            metrics::counter!("outbox_events_failed_total").increment(failed_ids.len() as u64);
            self.release(&failed_ids).await?;
        }

        Ok(sent_ids.len())
    }

    /// Inserts the children of an expandable row in one transaction.
    async fn expand_row(&self, row: &OutboxEvent) -> Result<()> {
        let Some(expander) = self.expanders.get(&row.event_type) else {
            return Ok(());
        };
        let children = expander.expand(row)?;
        if children.is_empty() {
            return Ok(());
        }
        let count = children.len() as u64;
        self.store.insert_batch(children).await?;
        self.backlog.add(count);
        tracing::debug!(row_id = row.id, children = count, "expanded row");
        Ok(())
    }

    async fn release(&self, ids: &[i64]) -> Result<()> {
        self.store.unclaim(ids).await?;
        self.backlog.add(ids.len() as u64);
        Ok(())
    }

    /// Spawns the configured number of polling workers.
    pub fn spawn_workers(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.config.workers)
            .map(|index| {
                let dispatcher = Arc::clone(&self);
                tokio::spawn(async move {
                    let worker_id = format!("worker-{index}");
                    tokio::time::sleep(dispatcher.config.startup_stagger * index as u32).await;
                    let mut ticker = tokio::time::interval(dispatcher.config.poll_interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        if let Err(error) = dispatcher.poll_once(&worker_id).await {
                            tracing::error!(worker_id, %error, "dispatch cycle failed");
                        }
                    }
                })
            })
            .collect()
    }
}
