//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::jobs::queue::STATUS_PENDING;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    /// Jobs waiting to run, absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_jobs: Option<i64>,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending_jobs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status = $1")
        .bind(STATUS_PENDING)
        .fetch_one(&state.db)
        .await
        .ok();

    let db_status = match pending_jobs {
        Some(_) => "connected".to_string(),
        None => "disconnected".to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        pending_jobs,
    })
}
