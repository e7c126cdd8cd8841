use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted scheduling intent owned by a client.
///
/// `start_time` and `next_fire_time` are wall-clock values in `time_zone`;
/// `created_at`/`updated_at` are absolute instants. Schedule type and status
/// are stored as their wire strings (see [`ScheduleType`] and [`JobStatus`]).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub client_id: String,
    pub schedule_type: String,
    pub cron_expression: Option<String>,
    pub time_zone: String,
    pub start_time: Option<NaiveDateTime>,
    pub next_fire_time: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn schedule_type(&self) -> Option<ScheduleType> {
        ScheduleType::parse(&self.schedule_type)
    }

    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.schedule_type(), Some(ScheduleType::Recurring))
    }
}

/// Fields for a job row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub client_id: String,
    pub schedule_type: ScheduleType,
    pub cron_expression: Option<String>,
    pub time_zone: String,
    pub start_time: Option<NaiveDateTime>,
    pub next_fire_time: Option<NaiveDateTime>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleType {
    Immediate,
    OneTime,
    Recurring,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "IMMEDIATE",
            Self::OneTime => "ONE_TIME",
            Self::Recurring => "RECURRING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IMMEDIATE" => Some(Self::Immediate),
            "ONE_TIME" => Some(Self::OneTime),
            "RECURRING" => Some(Self::Recurring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Persisted but not yet handed to the trigger engine.
    Scheduling,
    Scheduled,
    Running,
    CompletedSuccess,
    CompletedFailure,
    Paused,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduling => "SCHEDULING",
            Self::Scheduled => "SCHEDULED",
            Self::Running => "RUNNING",
            Self::CompletedSuccess => "COMPLETED_SUCCESS",
            Self::CompletedFailure => "COMPLETED_FAILURE",
            Self::Paused => "PAUSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULING" => Some(Self::Scheduling),
            "SCHEDULED" => Some(Self::Scheduled),
            "RUNNING" => Some(Self::Running),
            "COMPLETED_SUCCESS" => Some(Self::CompletedSuccess),
            "COMPLETED_FAILURE" => Some(Self::CompletedFailure),
            "PAUSED" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedSuccess | Self::CompletedFailure)
    }
}

/// Durable trigger row backing the in-memory firing queue.
#[derive(Debug, Clone, FromRow)]
pub struct JobTrigger {
    pub job_id: Uuid,
    pub next_fire_at: DateTime<Utc>,
    pub cron_expression: Option<String>,
    pub time_zone: String,
    pub paused: bool,
}

/// A user record belonging to a client; the unit published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub client_id: String,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
