//! Cron translation
//!
//! Turns structured recurrence descriptors into canonical 6-field cron
//! expressions (`sec min hour dom month dow`, `?` for the non-constraining
//! day field) and computes zone-aware next fire instants.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use super::{SchedulerError, SchedulerResult};

/// Structured recurrence options, already range-checked.
///
/// Precedence when several are present: hourly interval, then days of week,
/// then days of month, then a plain daily schedule at `hour:minute`.
#[derive(Debug, Clone, Default)]
pub struct RecurrenceDescriptor {
    pub hourly_interval: Option<u32>,
    pub days_of_week: Vec<u32>,
    pub days_of_month: Vec<u32>,
    pub hour: u32,
    pub minute: u32,
}

const DAY_NAMES: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Build the canonical cron expression for a descriptor.
pub fn build_expression(descriptor: &RecurrenceDescriptor) -> String {
    let minute = descriptor.minute;
    let hour = descriptor.hour;

    if let Some(interval) = descriptor.hourly_interval {
        return format!("0 {} */{} * * ?", minute, interval);
    }

    if !descriptor.days_of_week.is_empty() {
        let days = descriptor
            .days_of_week
            .iter()
            .map(|d| DAY_NAMES[(*d as usize - 1) % 7])
            .collect::<Vec<_>>()
            .join(",");
        return format!("0 {} {} ? * {}", minute, hour, days);
    }

    if !descriptor.days_of_month.is_empty() {
        let days = descriptor
            .days_of_month
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        return format!("0 {} {} {} * ?", minute, hour, days);
    }

    format!("0 {} {} * * ?", minute, hour)
}

/// Syntactic validation of a cron expression.
pub fn validate(expression: &str) -> SchedulerResult<()> {
    Schedule::from_str(expression)
        .map(|_| ())
        .map_err(|_| SchedulerError::InvalidCron(expression.to_string()))
}

/// Next instant strictly after `after` satisfying `expression` in `tz`.
///
/// The schedule is evaluated on local wall-clock times, so fires that land in
/// a DST gap are skipped and fall-back wall times fire once.
pub fn next_after(
    after: DateTime<Utc>,
    expression: &str,
    tz: Tz,
) -> SchedulerResult<Option<DateTime<Utc>>> {
    let schedule = Schedule::from_str(expression)
        .map_err(|_| SchedulerError::InvalidCron(expression.to_string()))?;
    let local = after.with_timezone(&tz);
    Ok(schedule.after(&local).next().map(|dt| dt.with_timezone(&Utc)))
}
