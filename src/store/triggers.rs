//! Trigger store
//!
//! Durable side of the firing queue. Every in-memory mutation in the engine
//! is written here first, and the queue is rebuilt from these rows on
//! process start.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct TriggerStore {
    pool: PgPool,
}

/// A trigger row joined with the job fields the engine needs to rebuild its
/// queue after a restart.
#[derive(Debug, Clone, FromRow)]
pub struct RestoredTrigger {
    pub job_id: Uuid,
    pub client_id: String,
    pub schedule_type: String,
    pub cron_expression: Option<String>,
    pub time_zone: String,
    pub next_fire_at: DateTime<Utc>,
    pub paused: bool,
}

impl TriggerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        job_id: Uuid,
        next_fire_at: DateTime<Utc>,
        cron_expression: Option<&str>,
        time_zone: &str,
        paused: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO job_triggers (job_id, next_fire_at, cron_expression, time_zone, paused) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (job_id) DO UPDATE SET \
             next_fire_at = EXCLUDED.next_fire_at, \
             cron_expression = EXCLUDED.cron_expression, \
             time_zone = EXCLUDED.time_zone, \
             paused = EXCLUDED.paused",
        )
        .bind(job_id)
        .bind(next_fire_at)
        .bind(cron_expression)
        .bind(time_zone)
        .bind(paused)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_next_fire(
        &self,
        job_id: Uuid,
        next_fire_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE job_triggers SET next_fire_at = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(next_fire_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_paused(&self, job_id: Uuid, paused: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE job_triggers SET paused = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(paused)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, job_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM job_triggers WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Triggers of all non-terminal jobs, paused ones included.
    pub async fn load_active(&self) -> Result<Vec<RestoredTrigger>, sqlx::Error> {
        sqlx::query_as::<_, RestoredTrigger>(
            "SELECT t.job_id, j.client_id, j.schedule_type, t.cron_expression, \
             t.time_zone, t.next_fire_at, t.paused \
             FROM job_triggers t \
             JOIN jobs j ON j.id = t.job_id \
             WHERE j.status NOT IN ('COMPLETED_SUCCESS', 'COMPLETED_FAILURE') \
             ORDER BY t.next_fire_at, t.job_id",
        )
        .fetch_all(&self.pool)
        .await
    }
}
