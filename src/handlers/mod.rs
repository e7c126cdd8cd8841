use axum::{extract::State, response::Json};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub mod jobs;

pub use jobs::job_routes;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database = if crate::database::health_check(&state.db_pool).await {
        "healthy"
    } else {
        "unhealthy"
    };
    Json(json!({
        "status": "ok",
        "database": database,
    }))
}
