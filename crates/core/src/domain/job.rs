// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unique job key supplied by the producer
pub type JobKey = String;

/// Job status. `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Job Entity
///
/// A job groups the items generated for one script. The counters are only
/// ever moved forward by the store; the methods below describe the same rules
/// the store enforces atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_key: JobKey,
    pub script_id: String,
    pub user_id: String,

    pub total_items: i64,
    pub completed_items: i64,
    pub status: JobStatus,
    pub item_ids: Vec<String>,
    pub error: Option<String>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl Job {
    /// Create a new processing job
    ///
    /// `total_items` is clamped to at least 1 so a job can always complete.
    pub fn new(
        job_key: impl Into<String>,
        script_id: impl Into<String>,
        user_id: impl Into<String>,
        total_items: i64,
        now_millis: i64,
    ) -> Self {
        Self {
            job_key: job_key.into(),
            script_id: script_id.into(),
            user_id: user_id.into(),
            total_items: total_items.max(1),
            completed_items: 0,
            status: JobStatus::Processing,
            item_ids: Vec::new(),
            error: None,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    /// All requested items have been produced
    pub fn is_saturated(&self) -> bool {
        self.completed_items >= self.total_items
    }

    /// Count a generated item and append its id
    ///
    /// Refuses to push `completed_items` past `total_items`.
    pub fn record_item(&mut self, item_id: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.is_saturated() {
            return Err(DomainError::CounterOverflow {
                completed: self.completed_items,
                total: self.total_items,
            });
        }
        self.completed_items += 1;
        self.item_ids.push(item_id.into());
        self.updated_at = now_millis;
        Ok(())
    }

    /// processing -> completed, only once every item is in
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Processing || !self.is_saturated() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: JobStatus::Completed.to_string(),
            });
        }
        self.status = JobStatus::Completed;
        self.updated_at = now_millis;
        Ok(())
    }

    /// processing -> failed, only while nothing has been produced
    pub fn fail(&mut self, error: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Processing || !self.item_ids.is_empty() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: JobStatus::Failed.to_string(),
            });
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = now_millis;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(total: i64) -> Job {
        Job::new("job-1", "script-1", "user-1", total, 1_000)
    }

    #[test]
    fn test_new_job_starts_processing() {
        let job = job(3);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.completed_items, 0);
        assert!(job.item_ids.is_empty());
    }

    #[test]
    fn test_zero_total_is_clamped() {
        assert_eq!(job(0).total_items, 1);
    }

    #[test]
    fn test_counter_never_exceeds_total() {
        let mut job = job(2);
        job.record_item("a", 2_000).unwrap();
        job.record_item("b", 3_000).unwrap();
        let err = job.record_item("c", 4_000).unwrap_err();
        assert!(matches!(err, DomainError::CounterOverflow { .. }));
        assert_eq!(job.completed_items, 2);
        assert_eq!(job.item_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_complete_requires_saturation() {
        let mut job = job(2);
        job.record_item("a", 2_000).unwrap();
        assert!(job.complete(2_500).is_err());
        job.record_item("b", 3_000).unwrap();
        job.complete(3_500).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_fail_only_without_items() {
        let mut partial = job(3);
        partial.record_item("a", 2_000).unwrap();
        assert!(partial.fail("boom", 2_500).is_err());
        assert_eq!(partial.status, JobStatus::Processing);

        let mut empty = job(1);
        empty.fail("boom", 2_500).unwrap();
        assert_eq!(empty.status, JobStatus::Failed);
        assert_eq!(empty.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_terminal_status_is_absorbing() {
        let mut job = job(1);
        job.fail("boom", 2_000).unwrap();
        assert!(job.complete(3_000).is_err());
        assert!(job.fail("again", 3_000).is_err());
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }
}
