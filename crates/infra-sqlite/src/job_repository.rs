// SQLite JobRepository Implementation
//
// Each mutation is one SQL statement; the WHERE clauses carry the job
// invariants so concurrent workers cannot break them.

use crate::error::{corrupt_row, map_sqlx_error};
use async_trait::async_trait;
use frameforge_core::domain::{Job, JobStatus};
use frameforge_core::error::{AppError, Result};
use frameforge_core::port::JobRepository;
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, job_key: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT job_key FROM jobs WHERE job_key = ?")
            .bind(job_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn find_or_create(&self, draft: &Job) -> Result<Job> {
        let item_ids = serde_json::to_string(&draft.item_ids)?;

        // Unique-key upsert: the first writer wins, later drafts are ignored
        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (
                job_key, script_id, user_id, total_items, completed_items,
                status, item_ids, error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_key) DO NOTHING
            "#,
        )
        .bind(&draft.job_key)
        .bind(&draft.script_id)
        .bind(&draft.user_id)
        .bind(draft.total_items)
        .bind(draft.completed_items)
        .bind(draft.status.as_str())
        .bind(&item_ids)
        .bind(&draft.error)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if inserted.rows_affected() > 0 {
            debug!(job_key = %draft.job_key, total = draft.total_items, "Job created");
        }

        self.find_by_key(&draft.job_key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", draft.job_key)))
    }

    async fn find_by_key(&self, job_key: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE job_key = ?")
            .bind(job_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn record_completion(
        &self,
        job_key: &str,
        item_id: &str,
        now_millis: i64,
    ) -> Result<Option<Job>> {
        // Increment and append in one statement, guarded by the total
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET completed_items = completed_items + 1,
                item_ids = json_insert(item_ids, '$[#]', ?),
                updated_at = ?
            WHERE job_key = ? AND completed_items < total_items
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(now_millis)
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row.into_job().map(Some),
            None if self.exists(job_key).await? => Ok(None),
            None => Err(AppError::NotFound(format!("Job {} not found", job_key))),
        }
    }

    async fn mark_completed(&self, job_key: &str, now_millis: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, updated_at = ?
            WHERE job_key = ?
              AND status = ?
              AND completed_items = total_items
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(now_millis)
        .bind(job_key)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, job_key: &str, error: &str, now_millis: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, error = ?, updated_at = ?
            WHERE job_key = ?
              AND status = ?
              AND json_array_length(item_ids) = 0
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(now_millis)
        .bind(job_key)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_key: String,
    script_id: String,
    user_id: String,
    total_items: i64,
    completed_items: i64,
    status: String,
    item_ids: String, // JSON array
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e| corrupt_row("jobs", &self.job_key, e))?;
        let item_ids: Vec<String> = serde_json::from_str(&self.item_ids)
            .map_err(|e| corrupt_row("jobs", &self.job_key, e))?;

        Ok(Job {
            job_key: self.job_key,
            script_id: self.script_id,
            user_id: self.user_id,
            total_items: self.total_items,
            completed_items: self.completed_items,
            status,
            item_ids,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
