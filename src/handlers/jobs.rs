use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::Job;
use crate::AppState;

/// Job creation request.
///
/// `start_time` is a zone-less local date-time (`yyyy-MM-ddTHH:mm:ss`)
/// interpreted in `time_zone`; `time_zone` falls back to the configured
/// default when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    pub client_id: Option<String>,
    pub schedule_type: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub time_zone: Option<String>,
    pub cron_expression: Option<String>,
    pub days_of_week: Option<Vec<i32>>,
    pub days_of_month: Option<Vec<i32>>,
    pub hourly_interval: Option<i32>,
    pub recurring_time_hour: Option<i32>,
    pub recurring_time_minute: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub client_id: String,
    pub schedule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    pub time_zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_fire_time: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id,
            client_id: job.client_id.clone(),
            schedule_type: job.schedule_type.clone(),
            cron_expression: job.cron_expression.clone(),
            time_zone: job.time_zone.clone(),
            start_time: job.start_time,
            next_fire_time: job.next_fire_time,
            status: job.status.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            error: None,
        }
    }
}

pub fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:id", get(get_job).delete(delete_job))
        .route("/:id/pause", patch(pause_job))
        .route("/:id/resume", patch(resume_job))
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobRequest>,
) -> ApiResult<(StatusCode, Json<JobResponse>)> {
    tracing::info!(
        "Received request to create job for client {:?} (type {:?}, zone {:?})",
        request.client_id,
        request.schedule_type,
        request.time_zone
    );
    let response = state.jobs.create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<JobResponse>>> {
    Ok(Json(state.jobs.list().await?))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobResponse>> {
    Ok(Json(state.jobs.get(id).await?))
}

async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.jobs.delete(id).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.jobs.pause(id).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.jobs.resume(id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_request_parses_local_start_time() {
        let request: JobRequest = serde_json::from_str(
            r#"{
                "client_id": "CLIENT_ABC",
                "schedule_type": "ONE_TIME",
                "start_time": "2030-01-01T12:00:00",
                "time_zone": "Asia/Kolkata"
            }"#,
        )
        .unwrap();
        assert_eq!(request.client_id.as_deref(), Some("CLIENT_ABC"));
        let start = request.start_time.unwrap();
        assert_eq!(start.format("%Y-%m-%dT%H:%M:%S").to_string(), "2030-01-01T12:00:00");
    }

    #[test]
    fn test_job_request_recurring_descriptor_fields() {
        let request: JobRequest = serde_json::from_str(
            r#"{
                "client_id": "Y",
                "schedule_type": "RECURRING",
                "time_zone": "UTC",
                "days_of_week": [1, 3, 5],
                "recurring_time_hour": 9,
                "recurring_time_minute": 0
            }"#,
        )
        .unwrap();
        assert_eq!(request.days_of_week, Some(vec![1, 3, 5]));
        assert_eq!(request.recurring_time_hour, Some(9));
    }

    #[test]
    fn test_job_response_omits_empty_optionals() {
        let job = Job {
            id: Uuid::new_v4(),
            client_id: "X".to_string(),
            schedule_type: "IMMEDIATE".to_string(),
            cron_expression: None,
            time_zone: "UTC".to_string(),
            start_time: None,
            next_fire_time: None,
            status: "SCHEDULING".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let body = serde_json::to_value(JobResponse::from_job(&job)).unwrap();
        assert!(body.get("cron_expression").is_none());
        assert!(body.get("next_fire_time").is_none());
        assert!(body.get("error").is_none());
        assert_eq!(body["status"], "SCHEDULING");
    }
}
