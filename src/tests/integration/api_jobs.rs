// Job API lifecycle tests against a real database.
//
// These exercise the create/read/delete/pause/resume surface through the job
// service. They need PostgreSQL (TEST_DATABASE_URL or Docker) and are ignored
// by default.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use uuid::Uuid;

use crate::error::AppError;
use crate::scheduler::clock;
use crate::tests::{fixtures, TestHarness};

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_one_time_job_schedules() {
    let harness = TestHarness::start().await;
    let zone = clock::resolve_zone("Asia/Kolkata").unwrap();
    let start = clock::to_wall(clock::now() + ChronoDuration::hours(1), zone);

    let response = harness
        .service
        .create(fixtures::one_time_request("CLIENT_ABC", start, "Asia/Kolkata"))
        .await
        .unwrap();

    assert_eq!(response.client_id, "CLIENT_ABC");
    assert_eq!(response.time_zone, "Asia/Kolkata");
    assert_eq!(response.status, "SCHEDULING");

    // The post-commit hook registers the trigger and flips the status
    assert!(
        harness
            .wait_for_status(response.id, "SCHEDULED", Duration::from_secs(5))
            .await
    );
    let job = harness.store.get(response.id).await.unwrap().unwrap();
    assert_eq!(job.next_fire_time, Some(start));
    assert_eq!(job.time_zone, "Asia/Kolkata");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_past_start_time_rejected_without_persisting() {
    let harness = TestHarness::start().await;
    let zone = clock::resolve_zone("Asia/Kolkata").unwrap();
    let start = clock::to_wall(clock::now() - ChronoDuration::hours(1), zone);

    let result = harness
        .service
        .create(fixtures::one_time_request("CLIENT_ABC", start, "Asia/Kolkata"))
        .await;

    assert!(matches!(result, Err(AppError::PastScheduleTime(_))));
    assert!(harness.store.list().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_start_time_within_grace_accepted() {
    let harness = TestHarness::start().await;
    let zone = clock::resolve_zone("UTC").unwrap();
    let start = clock::to_wall(clock::now() - ChronoDuration::seconds(10), zone);

    let response = harness
        .service
        .create(fixtures::one_time_request("CLIENT_GRACE", start, "UTC"))
        .await
        .unwrap();
    assert_eq!(response.status, "SCHEDULING");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_invalid_zone_rejected() {
    let harness = TestHarness::start().await;
    let result = harness
        .service
        .create(fixtures::immediate_request("X", "Mars/Olympus"))
        .await;
    assert!(matches!(result, Err(AppError::InvalidTimeZone(_))));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_invalid_cron_rejected() {
    let harness = TestHarness::start().await;
    let result = harness
        .service
        .create(fixtures::raw_cron_request("X", "UTC", "every now and then"))
        .await;
    assert!(matches!(result, Err(AppError::InvalidCron(_))));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_blank_client_id_rejected() {
    let harness = TestHarness::start().await;
    let result = harness
        .service
        .create(fixtures::immediate_request("   ", "UTC"))
        .await;
    assert!(matches!(result, Err(AppError::ValidationError { .. })));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_recurring_descriptor_builds_cron() {
    let harness = TestHarness::start().await;
    let response = harness
        .service
        .create(fixtures::weekly_request("Y", "UTC", vec![1, 3, 5], 9, 0))
        .await
        .unwrap();

    assert_eq!(
        response.cron_expression.as_deref(),
        Some("0 0 9 ? * MON,WED,FRI")
    );
    assert!(
        harness
            .wait_for_status(response.id, "SCHEDULED", Duration::from_secs(5))
            .await
    );
    let job = harness.store.get(response.id).await.unwrap().unwrap();
    assert!(job.next_fire_time.is_some());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_default_zone_applied_when_omitted() {
    let harness = TestHarness::start_in_zone("Asia/Kolkata").await;
    let request = crate::handlers::jobs::JobRequest {
        client_id: Some("Z".to_string()),
        schedule_type: Some("IMMEDIATE".to_string()),
        ..Default::default()
    };
    let response = harness.service.create(request).await.unwrap();
    assert_eq!(response.time_zone, "Asia/Kolkata");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_get_unknown_job_is_not_found() {
    let harness = TestHarness::start().await;
    let result = harness.service.get(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_delete_removes_job_and_trigger() {
    let harness = TestHarness::start().await;
    let response = harness
        .service
        .create(fixtures::weekly_request("D", "UTC", vec![1], 0, 0))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_status(response.id, "SCHEDULED", Duration::from_secs(5))
            .await
    );

    harness.service.delete(response.id).await.unwrap();

    assert!(harness.store.get(response.id).await.unwrap().is_none());
    let triggers: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM job_triggers WHERE job_id = $1")
            .bind(response.id)
            .fetch_one(&harness.ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(triggers, 0);

    // Idempotent
    harness.service.delete(response.id).await.unwrap();
}
