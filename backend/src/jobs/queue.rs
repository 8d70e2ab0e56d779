//! PostgreSQL-backed job queue
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED`, so concurrent workers
//! never pick the same row. Delivery is at-least-once: a job whose worker
//! died is put back by [`JobQueue::requeue_stale`], unless it already used
//! all its attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{AppError, AppResult};
use shared::jobs::{retry_delay_secs, Job};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

const JOB_COLUMNS: &str = "id, kind, payload, status, attempts, max_attempts, timeout_secs, \
     available_at, last_error, created_at, updated_at";

/// A row of the `jobs` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub timeout_secs: i32,
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn job(&self) -> AppResult<Job> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            AppError::ValidationError(format!("job {} has an invalid payload: {}", self.id, e))
        })
    }
}

/// What happened to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { delay_secs: i64 },
    Failed,
}

/// What the stale sweep does with a job whose worker went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleAction {
    Requeue,
    Fail,
}

/// `attempts` counts the claim that was lost
pub fn stale_action(attempts: i32, max_attempts: i32) -> StaleAction {
    if attempts >= max_attempts {
        StaleAction::Fail
    } else {
        StaleAction::Requeue
    }
}

/// Outcome of one stale sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleSweep {
    pub requeued: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,
    default_max_attempts: i32,
    default_timeout_secs: i32,
}

impl JobQueue {
    pub fn new(db: PgPool, config: &QueueConfig) -> Self {
        Self {
            db,
            default_max_attempts: config.default_max_attempts,
            default_timeout_secs: config.default_timeout_secs,
        }
    }

    pub async fn enqueue(&self, job: &Job) -> AppResult<JobRecord> {
        let policy = job.retry_policy();
        let payload = serde_json::to_value(job)
            .map_err(|e| AppError::Internal(format!("cannot encode job: {}", e)))?;

        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "INSERT INTO jobs (id, kind, payload, status, attempts, max_attempts, timeout_secs, \
                               available_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 0, $5, $6, NOW(), NOW(), NOW()) \
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(job.kind())
        .bind(payload)
        .bind(STATUS_PENDING)
        .bind(policy.max_attempts.unwrap_or(self.default_max_attempts))
        .bind(policy.timeout_secs.unwrap_or(self.default_timeout_secs))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(job_id = %record.id, kind = %record.kind, subject = %job.subject(), "Job enqueued");
        Ok(record)
    }

    /// Claim the oldest available job, marking it running
    pub async fn claim_next(&self) -> AppResult<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "UPDATE jobs SET status = $1, attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status = $2 AND available_at <= NOW() \
                 ORDER BY available_at, created_at \
                 FOR UPDATE SKIP LOCKED \
                 LIMIT 1) \
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(STATUS_RUNNING)
        .bind(STATUS_PENDING)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    pub async fn complete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE jobs SET status = $2, last_error = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(STATUS_COMPLETED)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Record a failed attempt; retry later unless attempts are exhausted
    /// or the error is permanent
    pub async fn fail(
        &self,
        record: &JobRecord,
        error: &str,
        retryable: bool,
    ) -> AppResult<FailOutcome> {
        if retryable && record.attempts < record.max_attempts {
            let delay_secs = retry_delay_secs(record.attempts);
            sqlx::query(
                "UPDATE jobs SET status = $2, last_error = $3, \
                 available_at = NOW() + make_interval(secs => $4), updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(record.id)
            .bind(STATUS_PENDING)
            .bind(error)
            .bind(delay_secs as f64)
            .execute(&self.db)
            .await?;
            return Ok(FailOutcome::Retrying { delay_secs });
        }

        sqlx::query("UPDATE jobs SET status = $2, last_error = $3, updated_at = NOW() WHERE id = $1")
            .bind(record.id)
            .bind(STATUS_FAILED)
            .bind(error)
            .execute(&self.db)
            .await?;
        Ok(FailOutcome::Failed)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<JobRecord> {
        sqlx::query_as::<_, JobRecord>(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))
    }

    /// Put back jobs left running past their timeout by a dead worker.
    ///
    /// Jobs that already used their last attempt are marked failed instead,
    /// so a job that keeps killing its worker does not loop forever.
    pub async fn requeue_stale(&self) -> AppResult<StaleSweep> {
        let mut tx = self.db.begin().await?;
        let stale: Vec<(Uuid, String, i32, i32)> = sqlx::query_as(
            "SELECT id, kind, attempts, max_attempts FROM jobs \
             WHERE status = $1 \
               AND updated_at + make_interval(secs => (timeout_secs * 2)::DOUBLE PRECISION) < NOW() \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(STATUS_RUNNING)
        .fetch_all(&mut *tx)
        .await?;

        let mut sweep = StaleSweep::default();
        for (id, kind, attempts, max_attempts) in stale {
            match stale_action(attempts, max_attempts) {
                StaleAction::Requeue => {
                    sqlx::query("UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1")
                        .bind(id)
                        .bind(STATUS_PENDING)
                        .execute(&mut *tx)
                        .await?;
                    sweep.requeued += 1;
                }
                StaleAction::Fail => {
                    sqlx::query(
                        "UPDATE jobs SET status = $2, last_error = $3, updated_at = NOW() \
                         WHERE id = $1",
                    )
                    .bind(id)
                    .bind(STATUS_FAILED)
                    .bind("worker lost on final attempt")
                    .execute(&mut *tx)
                    .await?;
                    tracing::error!(job_id = %id, %kind, attempts, "Stale job out of attempts, marked failed");
                    sweep.failed += 1;
                }
            }
        }
        tx.commit().await?;

        if sweep.requeued > 0 || sweep.failed > 0 {
            tracing::warn!(requeued = sweep.requeued, failed = sweep.failed, "Swept stale jobs");
        }
        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_job_with_attempts_left_is_requeued() {
        assert_eq!(stale_action(1, 3), StaleAction::Requeue);
        assert_eq!(stale_action(2, 3), StaleAction::Requeue);
    }

    #[test]
    fn test_stale_job_on_last_attempt_fails() {
        assert_eq!(stale_action(3, 3), StaleAction::Fail);
        assert_eq!(stale_action(5, 3), StaleAction::Fail);
        assert_eq!(stale_action(1, 1), StaleAction::Fail);
    }
}
