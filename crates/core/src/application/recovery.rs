// Crash recovery logic
use crate::domain::JobStatus;
use crate::port::{JobRepository, MessageBroker};
use std::sync::Arc;
use tracing::{info, warn};

/// What startup recovery found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Deliveries held by a dead consumer, now ready again
    pub requeued: u64,
    /// Jobs still waiting for items
    pub processing_jobs: i64,
}

/// Crash recovery service
///
/// On daemon startup, hands deliveries that were unacked when the previous
/// process died back to the queue. Their items run again through the normal
/// path; job counters are guarded at the store so a replay cannot push a job
/// past its total.
pub struct RecoveryService {
    broker: Arc<dyn MessageBroker>,
    job_repo: Arc<dyn JobRepository>,
}

impl RecoveryService {
    pub fn new(broker: Arc<dyn MessageBroker>, job_repo: Arc<dyn JobRepository>) -> Self {
        Self { broker, job_repo }
    }

    /// Must run before the consumer starts fetching
    pub async fn recover(&self, queue: &str) -> crate::error::Result<RecoveryReport> {
        info!(queue = %queue, "Starting delivery recovery");

        let requeued = self.broker.recover(queue).await?;
        if requeued > 0 {
            warn!(
                queue = %queue,
                requeued = requeued,
                "Requeued deliveries left unacked by a previous run"
            );
        }

        let processing_jobs = self.job_repo.count_by_status(JobStatus::Processing).await?;
        let depth = self.broker.depth(queue).await?;

        info!(
            queue = %queue,
            requeued = requeued,
            depth = depth,
            processing_jobs = processing_jobs,
            "Delivery recovery complete"
        );
        Ok(RecoveryReport {
            requeued,
            processing_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Job;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::message_broker::mocks::InMemoryBroker;

    #[tokio::test]
    async fn test_unacked_deliveries_are_requeued() {
        let broker = Arc::new(InMemoryBroker::new());
        let jobs = Arc::new(InMemoryJobRepository::new());
        broker.declare_queue("q").await.unwrap();
        broker.publish("q", b"one").await.unwrap();
        broker.publish("q", b"two").await.unwrap();
        broker.next_delivery("q").await.unwrap().unwrap();
        jobs.find_or_create(&Job::new("job-1", "s", "u", 2, 0))
            .await
            .unwrap();

        let service = RecoveryService::new(broker.clone(), jobs);
        let report = service.recover("q").await.unwrap();

        assert_eq!(report.requeued, 1);
        assert_eq!(report.processing_jobs, 1);
        assert_eq!(broker.unacked_count("q"), 0);

        // The recovered message is handed out again, oldest first
        let again = broker.next_delivery("q").await.unwrap().unwrap();
        assert_eq!(again.body, b"one");
        assert!(again.redelivered());
    }

    #[tokio::test]
    async fn test_clean_start_recovers_nothing() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.declare_queue("q").await.unwrap();

        let service = RecoveryService::new(broker, Arc::new(InMemoryJobRepository::new()));
        let report = service.recover("q").await.unwrap();

        assert_eq!(report, RecoveryReport::default());
    }
}
