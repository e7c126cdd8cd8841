// Shared builders for integration tests

use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

use crate::handlers::jobs::JobRequest;

pub async fn insert_user(pool: &PgPool, client_id: &str, name: &str, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, client_id, name, email) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(client_id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await
        .expect("Failed to insert user");
    id
}

pub fn immediate_request(client_id: &str, zone: &str) -> JobRequest {
    JobRequest {
        client_id: Some(client_id.to_string()),
        schedule_type: Some("IMMEDIATE".to_string()),
        time_zone: Some(zone.to_string()),
        ..Default::default()
    }
}

pub fn one_time_request(client_id: &str, start: NaiveDateTime, zone: &str) -> JobRequest {
    JobRequest {
        client_id: Some(client_id.to_string()),
        schedule_type: Some("ONE_TIME".to_string()),
        start_time: Some(start),
        time_zone: Some(zone.to_string()),
        ..Default::default()
    }
}

pub fn weekly_request(
    client_id: &str,
    zone: &str,
    days: Vec<i32>,
    hour: i32,
    minute: i32,
) -> JobRequest {
    JobRequest {
        client_id: Some(client_id.to_string()),
        schedule_type: Some("RECURRING".to_string()),
        time_zone: Some(zone.to_string()),
        days_of_week: Some(days),
        recurring_time_hour: Some(hour),
        recurring_time_minute: Some(minute),
        ..Default::default()
    }
}

pub fn raw_cron_request(client_id: &str, zone: &str, expression: &str) -> JobRequest {
    JobRequest {
        client_id: Some(client_id.to_string()),
        schedule_type: Some("RECURRING".to_string()),
        time_zone: Some(zone.to_string()),
        cron_expression: Some(expression.to_string()),
        ..Default::default()
    }
}
