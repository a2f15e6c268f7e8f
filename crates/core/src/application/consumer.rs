// Queue Consumer - bridges the durable queue to the worker pool
//
// One delivery -> one submission -> ack on success, nack+requeue otherwise.
// The broker's prefetch window (= pool capacity) bounds in-flight deliveries.

use crate::application::pool::WorkerPool;
use crate::application::worker::constants::{
    ERROR_RECOVERY_SLEEP_DURATION, IDLE_SLEEP_DURATION, SHUTDOWN_DRAIN_TIMEOUT,
};
use crate::application::worker::ShutdownToken;
use crate::domain::ItemRequest;
use crate::error::Result;
use crate::port::{Delivery, MessageBroker};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// How one delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Requeued,
}

/// Totals reported when `consume` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeStats {
    pub acked: u64,
    pub requeued: u64,
}

impl ConsumeStats {
    fn record(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Acked => self.acked += 1,
            Settlement::Requeued => self.requeued += 1,
        }
    }
}

#[derive(Clone)]
pub struct QueueConsumer {
    broker: Arc<dyn MessageBroker>,
    pool: WorkerPool,
    queue: String,
}

impl QueueConsumer {
    pub fn new(broker: Arc<dyn MessageBroker>, pool: WorkerPool, queue: impl Into<String>) -> Self {
        Self {
            broker,
            pool,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Declare the queue and cap unacked deliveries at pool capacity
    pub async fn connect(&self) -> Result<()> {
        self.broker.declare_queue(&self.queue).await?;
        self.broker
            .set_prefetch(&self.queue, self.pool.capacity())
            .await?;
        info!(
            queue = %self.queue,
            prefetch = self.pool.capacity(),
            "Consumer connected"
        );
        Ok(())
    }

    /// Consume until shutdown, then drain in-flight handlers
    pub async fn consume(&self, mut shutdown: ShutdownToken) -> Result<ConsumeStats> {
        info!(queue = %self.queue, "Consumer started");
        let mut handlers: JoinSet<Settlement> = JoinSet::new();
        let mut stats = ConsumeStats::default();

        loop {
            if shutdown.is_shutdown() {
                info!(queue = %self.queue, "Consumer shutting down");
                break;
            }

            match self.broker.next_delivery(&self.queue).await {
                Ok(Some(delivery)) => {
                    let consumer = self.clone();
                    handlers.spawn(async move { consumer.process_delivery(delivery).await });
                }
                Ok(None) => {
                    // Empty queue or prefetch window full; reap handlers meanwhile
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        Some(joined) = handlers.join_next() => self.reap(joined, &mut stats),
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Consumer interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Failed to fetch delivery");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Consumer interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }

        self.drain(&mut handlers, &mut stats).await;
        info!(
            queue = %self.queue,
            acked = stats.acked,
            requeued = stats.requeued,
            "Consumer stopped"
        );
        Ok(stats)
    }

    async fn drain(&self, handlers: &mut JoinSet<Settlement>, stats: &mut ConsumeStats) {
        if handlers.is_empty() {
            return;
        }
        info!(in_flight = handlers.len(), "Draining in-flight deliveries");

        let drained = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
            while let Some(joined) = handlers.join_next().await {
                self.reap(joined, stats);
            }
        })
        .await;

        if drained.is_err() {
            // Unsettled deliveries stay unacked and come back on recovery
            warn!(
                remaining = handlers.len(),
                "Drain timed out; leaving deliveries unacked"
            );
            handlers.detach_all();
        }
    }

    fn reap(
        &self,
        joined: std::result::Result<Settlement, tokio::task::JoinError>,
        stats: &mut ConsumeStats,
    ) {
        match joined {
            Ok(settlement) => stats.record(settlement),
            Err(e) => error!(queue = %self.queue, error = %e, "Delivery handler failed"),
        }
    }

    /// Parse, submit and settle one delivery
    pub async fn process_delivery(&self, delivery: Delivery) -> Settlement {
        let request: ItemRequest = match serde_json::from_slice(&delivery.body) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    tag = delivery.tag,
                    error = %e,
                    "Malformed message; requeueing"
                );
                return self.settle(&delivery, false).await;
            }
        };

        debug!(
            tag = delivery.tag,
            job_key = %request.job_key,
            item_scope = %request.item_scope,
            redelivered = delivery.redelivered(),
            "Delivery received"
        );

        let outcome = self.pool.submit(request).await;
        if !outcome.success {
            warn!(
                tag = delivery.tag,
                kind = ?outcome.kind,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Submission failed; requeueing"
            );
        }
        self.settle(&delivery, outcome.success).await
    }

    async fn settle(&self, delivery: &Delivery, success: bool) -> Settlement {
        let (settlement, result) = if success {
            (Settlement::Acked, self.broker.ack(delivery.tag).await)
        } else {
            (
                Settlement::Requeued,
                self.broker.nack(delivery.tag, true).await,
            )
        };

        if let Err(e) = result {
            // Broker redelivers unsettled messages on recovery
            error!(tag = delivery.tag, error = %e, "Failed to settle delivery");
        }
        settlement
    }

    /// Release the broker channel
    pub async fn close(&self) -> Result<()> {
        self.broker.close().await?;
        info!(queue = %self.queue, "Consumer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pool::PoolConfig;
    use crate::application::retry::RetryPolicy;
    use crate::application::worker::{shutdown_channel, ExecutorConfig, WorkerDeps};
    use crate::domain::JobStatus;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::image_generator::mocks::{MockBehavior, MockImageGenerator};
    use crate::port::image_storage::mocks::MockImageStorage;
    use crate::port::item_repository::mocks::InMemoryItemRepository;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::message_broker::mocks::InMemoryBroker;
    use crate::port::time_provider::SystemTimeProvider;
    use std::time::Duration;

    const QUEUE: &str = "image-generation";

    struct Fixture {
        consumer: QueueConsumer,
        broker: Arc<InMemoryBroker>,
        jobs: Arc<InMemoryJobRepository>,
        pool: WorkerPool,
    }

    async fn fixture(generator: MockImageGenerator, size: usize) -> Fixture {
        let broker = Arc::new(InMemoryBroker::new());
        let jobs = Arc::new(InMemoryJobRepository::new());
        let deps = WorkerDeps {
            job_repo: jobs.clone(),
            item_repo: Arc::new(InMemoryItemRepository::new()),
            generator: Arc::new(generator),
            storage: Arc::new(MockImageStorage::new_success()),
            id_provider: Arc::new(SequentialIdProvider::new("img")),
            time_provider: Arc::new(SystemTimeProvider),
        };
        let config = PoolConfig {
            size,
            restart_backoff: Duration::from_millis(1),
            executor: ExecutorConfig {
                retry: RetryPolicy::new(1, Duration::from_millis(1)),
                ..Default::default()
            },
        };
        let pool = WorkerPool::initialize(config, deps).await.unwrap();
        let consumer = QueueConsumer::new(broker.clone(), pool.clone(), QUEUE);
        consumer.connect().await.unwrap();
        Fixture {
            consumer,
            broker,
            jobs,
            pool,
        }
    }

    fn message(job_key: &str, scope: &str, total: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "jobKey": job_key,
            "userId": "user-1",
            "prompt": "a quiet mountain lake",
            "style": "watercolor",
            "scriptId": "script-1",
            "itemScope": scope,
            "metadata": { "totalItems": total }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_is_acked() {
        let f = fixture(MockImageGenerator::new_success(), 2).await;
        let tag = f.broker.publish(QUEUE, &message("job-1", "scene-1", 1)).await.unwrap();
        let delivery = f.broker.next_delivery(QUEUE).await.unwrap().unwrap();

        let settlement = f.consumer.process_delivery(delivery).await;

        assert_eq!(settlement, Settlement::Acked);
        assert_eq!(f.broker.acked(), vec![tag]);
        assert_eq!(f.broker.depth(QUEUE).await.unwrap(), 0);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_requeued() {
        let f = fixture(MockImageGenerator::new_success(), 1).await;
        let tag = f.broker.publish(QUEUE, b"{not json").await.unwrap();
        let delivery = f.broker.next_delivery(QUEUE).await.unwrap().unwrap();

        let settlement = f.consumer.process_delivery(delivery).await;

        assert_eq!(settlement, Settlement::Requeued);
        assert_eq!(f.broker.nacked(), vec![tag]);
        assert_eq!(f.broker.depth(QUEUE).await.unwrap(), 1);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_fault_is_requeued_and_redelivered() {
        let generator = MockImageGenerator::new_success()
            .with_script([MockBehavior::Panic("boom".into())]);
        let f = fixture(generator, 1).await;
        f.broker.publish(QUEUE, &message("job-2", "scene-1", 1)).await.unwrap();

        let first = f.broker.next_delivery(QUEUE).await.unwrap().unwrap();
        assert_eq!(f.consumer.process_delivery(first).await, Settlement::Requeued);

        let second = f.broker.next_delivery(QUEUE).await.unwrap().unwrap();
        assert!(second.redelivered());
        assert_eq!(f.consumer.process_delivery(second).await, Settlement::Acked);
        assert_eq!(f.jobs.get("job-2").unwrap().status, JobStatus::Completed);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_sets_prefetch_to_capacity() {
        let f = fixture(MockImageGenerator::new_success(), 2).await;
        for i in 0..3 {
            f.broker
                .publish(QUEUE, &message(&format!("job-{}", i), "scene-1", 1))
                .await
                .unwrap();
        }

        assert!(f.broker.next_delivery(QUEUE).await.unwrap().is_some());
        assert!(f.broker.next_delivery(QUEUE).await.unwrap().is_some());
        assert!(f.broker.next_delivery(QUEUE).await.unwrap().is_none());
        assert_eq!(f.broker.unacked_count(QUEUE), 2);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_consume_processes_queue_until_shutdown() {
        let f = fixture(MockImageGenerator::new_success(), 2).await;
        for scope in ["scene-1", "scene-2", "scene-3"] {
            f.broker
                .publish(QUEUE, &message("job-3", scope, 3))
                .await
                .unwrap();
        }

        let (tx, token) = shutdown_channel();
        let consumer = f.consumer.clone();
        let running = tokio::spawn(async move { consumer.consume(token).await });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while f.broker.depth(QUEUE).await.unwrap() > 0 {
            assert!(tokio::time::Instant::now() < deadline, "queue never drained");
            sleep(Duration::from_millis(10)).await;
        }
        tx.shutdown();

        let stats = running.await.unwrap().unwrap();
        assert_eq!(stats.acked, 3);
        assert_eq!(stats.requeued, 0);

        let job = f.jobs.get("job-3").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_items, 3);

        f.consumer.close().await.unwrap();
        assert!(f.broker.is_closed());
        f.pool.shutdown().await;
    }
}
