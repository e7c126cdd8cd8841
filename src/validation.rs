//! Request validation for the Cadence API
//!
//! Field-level checks for job requests; structural checks only, the
//! scheduling-domain rules (zone resolution, past-time grace, cron syntax)
//! live in the job service.

use crate::error::{validation_error, AppError, ValidationBuilder};
use crate::models::ScheduleType;

/// Validation result type
pub type ValidationResult<T> = Result<T, AppError>;

/// Validate required non-empty string
pub fn required_string(value: &str, field: &str) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(validation_error(field, &format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a schedule type from its wire string
pub fn schedule_type(value: &str, field: &str) -> ValidationResult<ScheduleType> {
    ScheduleType::parse(value.trim()).ok_or_else(|| {
        validation_error(
            field,
            &format!(
                "{} must be one of IMMEDIATE, ONE_TIME, RECURRING (got '{}')",
                field, value
            ),
        )
    })
}

/// Validate the recurrence descriptor fields of a job request.
///
/// Ranges follow the request contract: days of week 1-7 (Monday-Sunday),
/// days of month 1-31, hourly interval >= 1, hour 0-23, minute 0-59.
pub struct RecurrenceFields<'a> {
    pub days_of_week: Option<&'a [i32]>,
    pub days_of_month: Option<&'a [i32]>,
    pub hourly_interval: Option<i32>,
    pub recurring_time_hour: Option<i32>,
    pub recurring_time_minute: Option<i32>,
}

pub fn recurrence(fields: &RecurrenceFields<'_>) -> ValidationResult<()> {
    let mut builder = ValidationBuilder::new();

    if let Some(days) = fields.days_of_week {
        if days.is_empty() {
            builder = builder.error("days_of_week", "days_of_week cannot be empty");
        }
        if days.iter().any(|d| !(1..=7).contains(d)) {
            builder = builder.error(
                "days_of_week",
                "days_of_week values must be between 1 (Monday) and 7 (Sunday)",
            );
        }
    }

    if let Some(days) = fields.days_of_month {
        if days.is_empty() {
            builder = builder.error("days_of_month", "days_of_month cannot be empty");
        }
        if days.iter().any(|d| !(1..=31).contains(d)) {
            builder = builder.error(
                "days_of_month",
                "days_of_month values must be between 1 and 31",
            );
        }
    }

    if let Some(interval) = fields.hourly_interval {
        if interval < 1 {
            builder = builder.error("hourly_interval", "hourly_interval must be at least 1");
        }
    }

    if let Some(hour) = fields.recurring_time_hour {
        if !(0..=23).contains(&hour) {
            builder = builder.error(
                "recurring_time_hour",
                "recurring_time_hour must be between 0 and 23",
            );
        }
    }

    if let Some(minute) = fields.recurring_time_minute {
        if !(0..=59).contains(&minute) {
            builder = builder.error(
                "recurring_time_minute",
                "recurring_time_minute must be between 0 and 59",
            );
        }
    }

    match builder.build() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
