// Job Repository Port (Interface)
//
// Every mutating operation is a single atomic store operation. Callers never
// read-modify-write a job.

use crate::domain::{Job, JobKey, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert `draft` unless a job with the same key exists; return the stored job
    ///
    /// Concurrent callers with the same key observe one single record.
    async fn find_or_create(&self, draft: &Job) -> Result<Job>;

    /// Find job by key
    async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>>;

    /// Atomically increment `completed_items` and append `item_id`
    ///
    /// Returns the updated job, or `None` when the counter already equals
    /// `total_items` (nothing is written in that case).
    async fn record_completion(
        &self,
        job_key: &str,
        item_id: &str,
        now_millis: i64,
    ) -> Result<Option<Job>>;

    /// processing -> completed when the counter has reached the total
    ///
    /// Returns true if this call performed the transition.
    async fn mark_completed(&self, job_key: &str, now_millis: i64) -> Result<bool>;

    /// processing -> failed when no item has been produced yet
    ///
    /// Returns true if this call performed the transition.
    async fn mark_failed(&self, job_key: &str, error: &str, now_millis: i64) -> Result<bool>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory job store; a single mutex makes every operation atomic
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobKey, Job>>,
        fail_next_completion: AtomicBool,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of a job (test helper)
        pub fn get(&self, job_key: &str) -> Option<Job> {
            self.jobs.lock().unwrap().get(job_key).cloned()
        }

        /// Make the next `mark_completed` fail before writing anything
        pub fn fail_next_completion(&self) {
            self.fail_next_completion.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn find_or_create(&self, draft: &Job) -> Result<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .entry(draft.job_key.clone())
                .or_insert_with(|| draft.clone());
            Ok(job.clone())
        }

        async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>> {
            Ok(self.get(job_key))
        }

        async fn record_completion(
            &self,
            job_key: &str,
            item_id: &str,
            now_millis: i64,
        ) -> Result<Option<Job>> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(job_key)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_key)))?;

            match job.record_item(item_id, now_millis) {
                Ok(()) => Ok(Some(job.clone())),
                Err(_) => Ok(None),
            }
        }

        async fn mark_completed(&self, job_key: &str, now_millis: i64) -> Result<bool> {
            if self.fail_next_completion.swap(false, Ordering::SeqCst) {
                return Err(AppError::Persistence("disk I/O error".to_string()));
            }
            let mut jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get_mut(job_key)
                .map(|job| job.complete(now_millis).is_ok())
                .unwrap_or(false))
        }

        async fn mark_failed(&self, job_key: &str, error: &str, now_millis: i64) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get_mut(job_key)
                .map(|job| job.fail(error, now_millis).is_ok())
                .unwrap_or(false))
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.values().filter(|job| job.status == status).count() as i64)
        }
    }
}
