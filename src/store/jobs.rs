//! Job store
//!
//! Transactional CRUD over job rows. Creation happens inside an explicit
//! transaction that can carry post-commit hooks: callbacks that run only
//! once the transaction has committed, and never on rollback. The scheduler
//! hand-off lives in such a hook so the engine can never observe a job whose
//! creating transaction might still roll back.
//!
//! `update_status`, `mark_scheduled` and `finish_fire` each run in their own
//! implicit transaction so the outcome of an asynchronous scheduling attempt
//! or a fire is recorded regardless of what happened to the caller's context.

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Job, JobStatus, NewJob};

type PostCommitHook = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

/// An open transaction over the jobs table with post-commit hooks.
///
/// Hooks are spawned onto the runtime after a successful commit; dropping the
/// transaction without committing rolls back and discards them.
pub struct JobTxn {
    tx: Transaction<'static, Postgres>,
    hooks: Vec<PostCommitHook>,
}

const JOB_COLUMNS: &str = "id, client_id, schedule_type, cron_expression, time_zone, \
     start_time, next_fire_time, status, created_at, updated_at";

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<JobTxn, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(JobTxn {
            tx,
            hooks: Vec::new(),
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition into RUNNING unless the job vanished or a racing pause got
    /// there first. Returns false when the fire should be dropped.
    pub async fn mark_running(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1 AND status <> $3",
        )
        .bind(id)
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Paused.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the status in an independent transaction.
    pub async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the next fire wall-clock time in an independent transaction.
    pub async fn update_next_fire(
        &self,
        id: Uuid,
        next_fire_time: Option<NaiveDateTime>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE jobs SET next_fire_time = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(next_fire_time)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition SCHEDULING -> SCHEDULED with the computed next fire time.
    /// Guarded on the current status: an immediate job can already be running
    /// or finished by the time the scheduling hook gets here, and a fresher
    /// state must not be stomped back to SCHEDULED.
    pub async fn mark_scheduled(
        &self,
        id: Uuid,
        next_fire_time: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, next_fire_time = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Scheduled.as_str())
        .bind(next_fire_time)
        .bind(JobStatus::Scheduling.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a fire's outcome and, for recurring jobs, the next wall-clock
    /// fire time (`None` clears it). Guarded on RUNNING: a pause that raced
    /// the fire keeps the job paused.
    pub async fn finish_fire(
        &self,
        id: Uuid,
        status: JobStatus,
        next_fire_time: Option<NaiveDateTime>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, next_fire_time = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(next_fire_time)
        .bind(JobStatus::Running.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl JobTxn {
    pub async fn insert(&mut self, new_job: &NewJob) -> Result<Job, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (id, client_id, schedule_type, cron_expression, time_zone, \
             start_time, next_fire_time, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(&new_job.client_id)
        .bind(new_job.schedule_type.as_str())
        .bind(&new_job.cron_expression)
        .bind(&new_job.time_zone)
        .bind(new_job.start_time)
        .bind(new_job.next_fire_time)
        .bind(new_job.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
    }

    /// Register a callback to run only if this transaction commits.
    pub fn after_commit<F>(&mut self, hook: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push(Box::pin(hook));
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await?;
        for hook in self.hooks {
            tokio::spawn(hook);
        }
        Ok(())
    }
}
