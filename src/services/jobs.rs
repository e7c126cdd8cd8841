//! API-facing job service
//!
//! Validates job requests, persists jobs, and hands them to the trigger
//! engine. The hand-off happens in a post-commit hook so the engine never
//! sees a job whose creating transaction could still roll back; the hook's
//! own failures are absorbed into the job's status, never surfaced to the
//! caller who already got a response.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{validation_error, AppError};
use crate::handlers::jobs::{JobRequest, JobResponse};
use crate::models::{JobStatus, NewJob, ScheduleType};
use crate::scheduler::{clock, cron, FireSpec, TriggerEngine};
use crate::store::JobStore;
use crate::validation;

/// Processing grace before a one-time start counts as past.
const PAST_GRACE_SECONDS: i64 = 30;

#[derive(Clone)]
pub struct JobService {
    store: JobStore,
    engine: Arc<TriggerEngine>,
    default_zone: String,
}

impl JobService {
    pub fn new(store: JobStore, engine: Arc<TriggerEngine>, default_zone: String) -> Self {
        Self {
            store,
            engine,
            default_zone,
        }
    }

    pub async fn create(&self, request: JobRequest) -> Result<JobResponse, AppError> {
        let client_id =
            validation::required_string(request.client_id.as_deref().unwrap_or(""), "client_id")?;
        let schedule_type = validation::schedule_type(
            request.schedule_type.as_deref().unwrap_or(""),
            "schedule_type",
        )?;

        let zone_name = request
            .time_zone
            .as_deref()
            .map(str::trim)
            .filter(|zone| !zone.is_empty())
            .unwrap_or(&self.default_zone)
            .to_string();
        let zone = clock::resolve_zone(&zone_name)
            .map_err(|_| AppError::InvalidTimeZone(zone_name.clone()))?;

        info!(
            "Creating {} job for client {} in zone {}",
            schedule_type.as_str(),
            client_id,
            zone_name
        );

        let now_wall = clock::to_wall(clock::now(), zone);
        let (start_time, next_fire_time, cron_expression) = match schedule_type {
            ScheduleType::Immediate => (Some(now_wall), None, None),
            ScheduleType::OneTime => {
                let start = request.start_time.ok_or_else(|| {
                    validation_error("start_time", "start_time is required for ONE_TIME jobs")
                })?;
                let start_instant = clock::to_instant(start, zone);
                if start_instant + Duration::seconds(PAST_GRACE_SECONDS) < clock::now() {
                    return Err(AppError::PastScheduleTime(format!(
                        "Cannot schedule job in the past. Current time in {} is {} but job was scheduled for {}",
                        zone_name,
                        now_wall.format("%Y-%m-%dT%H:%M:%S"),
                        start.format("%Y-%m-%dT%H:%M:%S"),
                    )));
                }
                (Some(start), Some(start), None)
            }
            ScheduleType::Recurring => {
                let expression = self.recurring_expression(&request)?;
                cron::validate(&expression)
                    .map_err(|_| AppError::InvalidCron(expression.clone()))?;
                (Some(now_wall), None, Some(expression))
            }
        };

        let new_job = NewJob {
            client_id,
            schedule_type,
            cron_expression,
            time_zone: zone_name,
            start_time,
            next_fire_time,
            status: JobStatus::Scheduling,
        };

        let mut txn = self.store.begin().await?;
        let job = txn.insert(&new_job).await?;

        // Hand off to the engine only once the insert is durable.
        let store = self.store.clone();
        let engine = self.engine.clone();
        let job_id = job.id;
        txn.after_commit(async move {
            finalize_scheduling(store, engine, job_id).await;
        });
        txn.commit().await?;

        info!("Job {} created for client {}", job.id, job.client_id);
        Ok(JobResponse::from_job(&job))
    }

    pub async fn get(&self, id: Uuid) -> Result<JobResponse, AppError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;
        Ok(JobResponse::from_job(&job))
    }

    pub async fn list(&self) -> Result<Vec<JobResponse>, AppError> {
        let jobs = self.store.list().await?;
        debug!("Retrieved {} jobs", jobs.len());
        Ok(jobs.iter().map(JobResponse::from_job).collect())
    }

    /// Remove the job, its trigger, and any queued or in-flight fire.
    /// Idempotent: deleting an unknown id succeeds.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let Some(job) = self.store.get(id).await? else {
            debug!("Job {} already deleted", id);
            return Ok(());
        };

        // Engine errors do not block row deletion; after a restart the
        // in-memory trigger would be gone anyway.
        if let Err(e) = self.engine.deregister(job.id).await {
            error!("Failed to deregister trigger for job {}: {}", id, e);
        }

        self.store.delete(id).await?;
        info!("Job {} deleted", id);
        Ok(())
    }

    /// Pause a scheduled job. A no-op unless the job is currently SCHEDULED.
    pub async fn pause(&self, id: Uuid) -> Result<(), AppError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;

        match job.status() {
            Some(JobStatus::Paused) => {
                debug!("Job {} already paused", id);
                Ok(())
            }
            Some(JobStatus::Scheduled) => {
                self.engine.pause(id).await?;
                self.store.update_status(id, JobStatus::Paused).await?;
                info!("Job {} paused", id);
                Ok(())
            }
            _ => {
                debug!("Job {} is {} and cannot be paused, ignoring", id, job.status);
                Ok(())
            }
        }
    }

    /// Resume a paused job. Fires skipped while paused are dropped, not
    /// caught up. A no-op unless the job is currently PAUSED.
    pub async fn resume(&self, id: Uuid) -> Result<(), AppError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;

        match job.status() {
            Some(JobStatus::Scheduled) => {
                debug!("Job {} already scheduled", id);
                Ok(())
            }
            Some(JobStatus::Paused) => {
                let zone = clock::resolve_zone(&job.time_zone)?;
                if let Some(next_fire) = self.engine.resume(id).await? {
                    self.store
                        .update_next_fire(id, Some(clock::to_wall(next_fire, zone)))
                        .await?;
                }
                self.store.update_status(id, JobStatus::Scheduled).await?;
                info!("Job {} resumed", id);
                Ok(())
            }
            _ => {
                debug!("Job {} is {} and cannot be resumed, ignoring", id, job.status);
                Ok(())
            }
        }
    }

    fn recurring_expression(&self, request: &JobRequest) -> Result<String, AppError> {
        // A raw expression wins over descriptor fields
        if let Some(expression) = request
            .cron_expression
            .as_deref()
            .map(str::trim)
            .filter(|expression| !expression.is_empty())
        {
            return Ok(expression.to_string());
        }

        validation::recurrence(&validation::RecurrenceFields {
            days_of_week: request.days_of_week.as_deref(),
            days_of_month: request.days_of_month.as_deref(),
            hourly_interval: request.hourly_interval,
            recurring_time_hour: request.recurring_time_hour,
            recurring_time_minute: request.recurring_time_minute,
        })?;

        let descriptor = cron::RecurrenceDescriptor {
            hourly_interval: request.hourly_interval.map(|interval| interval as u32),
            days_of_week: request
                .days_of_week
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|day| day as u32)
                .collect(),
            days_of_month: request
                .days_of_month
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|day| day as u32)
                .collect(),
            hour: request.recurring_time_hour.unwrap_or(0) as u32,
            minute: request.recurring_time_minute.unwrap_or(0) as u32,
        };
        Ok(cron::build_expression(&descriptor))
    }
}

/// Post-commit hand-off: re-read the job, register its trigger, and record
/// the outcome in independent transactions. Failures become a terminal
/// COMPLETED_FAILURE the client observes on subsequent reads.
async fn finalize_scheduling(store: JobStore, engine: Arc<TriggerEngine>, job_id: Uuid) {
    info!("Transaction committed, scheduling job {}", job_id);

    let outcome: Result<(), Box<dyn std::error::Error + Send + Sync>> = async {
        let job = store
            .get(job_id)
            .await?
            .ok_or_else(|| format!("job {} not found after commit", job_id))?;
        let zone = clock::resolve_zone(&job.time_zone)?;

        let spec = match job.schedule_type() {
            Some(ScheduleType::Immediate) => FireSpec::Now,
            Some(ScheduleType::OneTime) => {
                let start = job
                    .start_time
                    .ok_or_else(|| format!("one-time job {} has no start_time", job_id))?;
                FireSpec::At(clock::to_instant(start, zone))
            }
            Some(ScheduleType::Recurring) => FireSpec::Cron {
                expression: job
                    .cron_expression
                    .clone()
                    .ok_or_else(|| format!("recurring job {} has no cron expression", job_id))?,
            },
            None => {
                return Err(
                    format!("job {} has unknown schedule type {}", job_id, job.schedule_type)
                        .into(),
                )
            }
        };

        let first_fire = engine.register(&job, spec).await?;
        let next_wall = clock::to_wall(first_fire, zone);
        if store.mark_scheduled(job_id, next_wall).await? {
            info!(
                "Job {} scheduled, next fire at {} ({})",
                job_id, next_wall, job.time_zone
            );
        } else {
            debug!("Job {} already progressed past scheduling", job_id);
        }
        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        error!("Failed to schedule job {} after commit: {}", job_id, e);
        if let Err(update_err) = store.update_status(job_id, JobStatus::CompletedFailure).await {
            error!(
                "Failed to record scheduling failure for job {}: {}",
                job_id, update_err
            );
        }
    }
}
