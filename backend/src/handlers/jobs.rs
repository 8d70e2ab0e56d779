//! Job queue HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::jobs::{Job, JobQueue};
use crate::AppState;

/// Enqueue any job; the body is the tagged payload, e.g.
/// `{"kind": "send_welcome", "cotizacion_id": 12}`
pub async fn enqueue_job(State(state): State<AppState>, Json(job): Json<Job>) -> impl IntoResponse {
    let queue = JobQueue::new(state.db.clone(), &state.config.queue);

    match queue.enqueue(&job).await {
        Ok(record) => (StatusCode::ACCEPTED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    let queue = JobQueue::new(state.db.clone(), &state.config.queue);

    match queue.get(job_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}
