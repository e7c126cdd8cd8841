//! Per-fire execution
//!
//! Fetches the client's user records and fans each one out to the message
//! bus. A fire succeeds only if every publish succeeds; an empty record set
//! is a success with zero publishes. Status writes run in independent
//! transactions so outcomes are durable even though the scheduling context
//! that produced the fire is long gone.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::models::JobStatus;
use crate::services::publisher::{PublishAck, PublishError, RecordPublisher};
use crate::store::{JobStore, UserStore};

use super::{clock, Fire};

pub struct UserDataExecutor {
    jobs: JobStore,
    users: UserStore,
    publisher: Arc<dyn RecordPublisher>,
}

enum FireOutcome {
    Success(usize),
    Failed(String),
    Cancelled,
}

impl UserDataExecutor {
    pub fn new(jobs: JobStore, users: UserStore, publisher: Arc<dyn RecordPublisher>) -> Self {
        Self {
            jobs,
            users,
            publisher,
        }
    }

    pub async fn execute(&self, fire: Fire) {
        let job_id = fire.job_id;
        info!("executing job {} for client {}", job_id, fire.client_id);

        // The job row is authoritative; a fire whose job vanished or was
        // paused under it is dropped without retry.
        match self.jobs.mark_running(job_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("job {} missing or paused, dropping fire", job_id);
                return;
            }
            Err(e) => {
                error!("failed to mark job {} running: {}", job_id, e);
                return;
            }
        }

        match self.run_publishes(&fire).await {
            FireOutcome::Cancelled => {
                // The delete path owns the job row; leave no further writes.
                info!("job {} cancelled, abandoning fire", job_id);
            }
            FireOutcome::Success(published) => {
                let status = if fire.recurring {
                    JobStatus::Scheduled
                } else {
                    JobStatus::CompletedSuccess
                };
                self.finish(&fire, status).await;
                info!(
                    "job {} completed successfully, published {} records",
                    job_id, published
                );
            }
            FireOutcome::Failed(reason) => {
                error!("job {} fire failed: {}", job_id, reason);
                self.finish(&fire, JobStatus::CompletedFailure).await;
            }
        }
    }

    async fn run_publishes(&self, fire: &Fire) -> FireOutcome {
        if fire.cancel.is_cancelled() {
            return FireOutcome::Cancelled;
        }

        let records = tokio::select! {
            _ = fire.cancel.cancelled() => return FireOutcome::Cancelled,
            result = self.users.records_for(&fire.client_id) => match result {
                Ok(records) => records,
                Err(e) => return FireOutcome::Failed(format!("failed to load records: {}", e)),
            },
        };

        if records.is_empty() {
            info!(
                "no records for client {}, completing with zero publishes",
                fire.client_id
            );
            return FireOutcome::Success(0);
        }

        info!(
            "publishing {} records for client {} (job {})",
            records.len(),
            fire.client_id,
            fire.job_id
        );

        let publishes = join_all(records.iter().map(|record| self.publisher.publish(record)));
        let results = tokio::select! {
            _ = fire.cancel.cancelled() => return FireOutcome::Cancelled,
            results = publishes => results,
        };

        match aggregate_publishes(results) {
            Ok(published) => FireOutcome::Success(published),
            Err(reason) => FireOutcome::Failed(reason),
        }
    }

    async fn finish(&self, fire: &Fire, status: JobStatus) {
        let next_fire_time = fire
            .next_fire_at
            .map(|at| clock::to_wall(at, fire.time_zone));
        match self
            .jobs
            .finish_fire(fire.job_id, status, next_fire_time)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "job {} was deleted or paused during the fire, outcome not recorded",
                    fire.job_id
                );
            }
            Err(e) => {
                error!("failed to record outcome for job {}: {}", fire.job_id, e);
            }
        }
    }
}

/// All-or-fail aggregation: the fire succeeds only if every per-record
/// publish succeeded. Successful publishes are never rolled back.
fn aggregate_publishes(results: Vec<Result<PublishAck, PublishError>>) -> Result<usize, String> {
    let total = results.len();
    let failures: Vec<String> = results
        .into_iter()
        .filter_map(|result| result.err())
        .map(|e| e.to_string())
        .collect();
    if failures.is_empty() {
        Ok(total)
    } else {
        Err(format!(
            "{} of {} publishes failed: {}",
            failures.len(),
            total,
            failures.join("; ")
        ))
    }
}
