//! Standardized error handling for the Cadence API
//!
//! Every failure surfaced over HTTP is rendered as the same JSON body:
//! `{ timestamp, status, error, message, details? }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// ISO 8601 timestamp
    pub timestamp: String,
    /// HTTP status code
    pub status: u16,
    /// Error code (e.g., "VALIDATION_ERROR", "PAST_SCHEDULE_TIME")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level errors for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: status.as_u16(),
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that can be converted to HTTP responses
#[derive(Debug)]
pub enum AppError {
    // Request validation
    ValidationError { details: HashMap<String, Vec<String>> },
    InvalidTimeZone(String),
    PastScheduleTime(String),
    InvalidCron(String),

    // Resource errors
    NotFound(String),

    // Scheduling observed synchronously; asynchronous failures are absorbed
    // into job status updates instead
    SchedulingError(String),

    // Server errors
    DatabaseError(String),
    PublishError(String),
    InternalError(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError { .. }
            | Self::InvalidTimeZone(_)
            | Self::PastScheduleTime(_)
            | Self::InvalidCron(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SchedulingError(_)
            | Self::DatabaseError(_)
            | Self::PublishError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::InvalidTimeZone(_) => "INVALID_TIME_ZONE",
            Self::PastScheduleTime(_) => "PAST_SCHEDULE_TIME",
            Self::InvalidCron(_) => "INVALID_CRON",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SchedulingError(_) => "SCHEDULING_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::PublishError(_) => "PUBLISH_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::ValidationError { .. } => "Validation failed".to_string(),
            Self::InvalidTimeZone(zone) => format!("Invalid timezone: {}", zone),
            Self::PastScheduleTime(msg) => msg.clone(),
            Self::InvalidCron(expr) => format!("Invalid cron expression: {}", expr),
            Self::NotFound(resource) => format!("{} not found", resource),
            Self::SchedulingError(msg) => {
                tracing::error!("Scheduling error: {}", msg);
                "Failed to schedule job".to_string()
            }
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "A database error occurred".to_string()
            }
            Self::PublishError(msg) => {
                tracing::error!("Publish error: {}", msg);
                "Failed to publish to the message bus".to_string()
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An unexpected error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut error = ApiError::new(status, self.error_code(), self.message());

        if let Self::ValidationError { details } = &self {
            error.details = Some(details.clone());
        }

        (status, Json(error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource".to_string()),
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<crate::scheduler::SchedulerError> for AppError {
    fn from(err: crate::scheduler::SchedulerError) -> Self {
        use crate::scheduler::SchedulerError;
        match err {
            SchedulerError::ZoneUnknown(zone) => Self::InvalidTimeZone(zone),
            SchedulerError::InvalidCron(expr) => Self::InvalidCron(expr),
            SchedulerError::Database(e) => Self::DatabaseError(e.to_string()),
            SchedulerError::NoUpcomingFire(expr) => {
                Self::SchedulingError(format!("no upcoming fire time for cron: {}", expr))
            }
        }
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper to create validation errors
pub fn validation_error(field: &str, message: &str) -> AppError {
    let mut details = HashMap::new();
    details.insert(field.to_string(), vec![message.to_string()]);
    AppError::ValidationError { details }
}

/// Helper to accumulate multiple validation errors
pub struct ValidationBuilder {
    details: HashMap<String, Vec<String>>,
}

impl ValidationBuilder {
    pub fn new() -> Self {
        Self {
            details: HashMap::new(),
        }
    }

    pub fn error(mut self, field: &str, message: &str) -> Self {
        self.details
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    pub fn build(self) -> Option<AppError> {
        if self.details.is_empty() {
            None
        } else {
            Some(AppError::ValidationError {
                details: self.details,
            })
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.details.is_empty()
    }
}

impl Default for ValidationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
