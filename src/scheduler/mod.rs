// Trigger scheduling subsystem
//
// Translates job schedules into absolute firing instants, keeps the firing
// queue durable and in memory, and hands due fires to the worker pool.

pub mod clock;
pub mod cron;
pub mod engine;
pub mod executor;
pub mod worker;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use engine::TriggerEngine;
pub use executor::UserDataExecutor;
pub use worker::{CancellationMap, WorkerPool};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("unknown time zone: {0}")]
    ZoneUnknown(String),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("no upcoming fire time for cron expression: {0}")]
    NoUpcomingFire(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// How a job's trigger should fire.
#[derive(Debug, Clone)]
pub enum FireSpec {
    /// Dispatch as soon as the dispatcher sees the trigger.
    Now,
    /// Dispatch once at an absolute instant.
    At(DateTime<Utc>),
    /// Dispatch repeatedly per a cron expression evaluated in the job's zone.
    Cron { expression: String },
}

/// One dispatch of a job handed from the engine to a worker.
#[derive(Debug)]
pub struct Fire {
    pub job_id: Uuid,
    pub client_id: String,
    pub recurring: bool,
    pub time_zone: chrono_tz::Tz,
    /// Instant this fire was scheduled for (not when it was dispatched).
    pub fired_at: DateTime<Utc>,
    /// Already-computed following fire, present for recurring jobs.
    pub next_fire_at: Option<DateTime<Utc>>,
    pub cancel: CancellationToken,
}
