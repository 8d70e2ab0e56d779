//! Supplier status HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::jobs::{Job, JobQueue};
use crate::middleware::AuthUser;
use crate::models::StatusSource;
use crate::services::ProviderStatusService;
use crate::AppState;
use shared::ProviderStatus;

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionRequest {
    pub target: ProviderStatus,
    #[validate(range(min = 0))]
    pub expected_version: i64,
    #[serde(default)]
    pub force: bool,
}

/// Current status, version and newest audit row
pub async fn get_status(
    State(state): State<AppState>,
    Path(proveedor_id): Path<i64>,
) -> impl IntoResponse {
    let service = ProviderStatusService::new(state.db.clone());

    match service.current_status(proveedor_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Re-derive the status from the supplier's raw fields
pub async fn recompute(
    State(state): State<AppState>,
    Path(proveedor_id): Path<i64>,
) -> impl IntoResponse {
    let service = ProviderStatusService::new(state.db.clone());

    match service.recompute(proveedor_id, StatusSource::Recompute).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn transition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(proveedor_id): Path<i64>,
    Json(input): Json<TransitionRequest>,
) -> impl IntoResponse {
    if let Err(e) = input.validate() {
        return AppError::ValidationError(e.to_string()).into_response();
    }

    let service = ProviderStatusService::new(state.db.clone());
    tracing::info!(
        proveedor_id,
        target = input.target.as_str(),
        force = input.force,
        caller = %user.subject,
        "Status transition requested"
    );

    match service
        .transition(
            proveedor_id,
            input.expected_version,
            input.target,
            StatusSource::Api,
            input.force,
        )
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Audit rows, oldest first
pub async fn tracking_history(
    State(state): State<AppState>,
    Path(proveedor_id): Path<i64>,
) -> impl IntoResponse {
    let service = ProviderStatusService::new(state.db.clone());

    match service.history(proveedor_id).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::json!({ "tracking": entries })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Queue the pending inspection photos and videos for sending
pub async fn enqueue_inspection(
    State(state): State<AppState>,
    Path(proveedor_id): Path<i64>,
) -> impl IntoResponse {
    let queue = JobQueue::new(state.db.clone(), &state.config.queue);

    match queue.enqueue(&Job::SendInspectionMedia { proveedor_id }).await {
        Ok(record) => (StatusCode::ACCEPTED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}
