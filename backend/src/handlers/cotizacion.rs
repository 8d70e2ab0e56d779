//! Quotation document and dispatch handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::documents::{sanitize_file_name, DocumentService};
use crate::error::{AppError, AppResult};
use crate::jobs::{Job, JobQueue};
use crate::services::CotizacionService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RotuladoRequest {
    /// Empty means every supplier of the quotation
    #[serde(default)]
    pub proveedor_ids: Vec<i64>,
}

/// Serve generated bytes as a download
pub fn attachment(content_type: &'static str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", sanitize_file_name(file_name)),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Queue the labelling bundle for a quotation
pub async fn enqueue_rotulado(
    State(state): State<AppState>,
    Path(cotizacion_id): Path<i64>,
    body: Option<Json<RotuladoRequest>>,
) -> impl IntoResponse {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let cotizaciones = CotizacionService::new(state.db.clone());

    // Reject unknown ids now rather than in the worker
    if let Err(e) = cotizaciones
        .select_proveedores(cotizacion_id, &input.proveedor_ids)
        .await
    {
        return e.into_response();
    }

    let queue = JobQueue::new(state.db.clone(), &state.config.queue);
    let job = Job::ForceSendRotulado {
        cotizacion_id,
        proveedor_ids: input.proveedor_ids,
    };

    match queue.enqueue(&job).await {
        Ok(record) => (StatusCode::ACCEPTED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn render_contrato(state: &AppState, cotizacion_id: i64) -> AppResult<Vec<u8>> {
    let cotizaciones = CotizacionService::new(state.db.clone());
    let cotizacion = cotizaciones.get_cotizacion(cotizacion_id).await?;
    let contenedor = cotizaciones.contenedor_for(&cotizacion).await?;

    let documents = DocumentService::new(&state.config.documents);
    tokio::task::spawn_blocking(move || documents.contrato_pdf(&cotizacion, contenedor.as_ref()))
        .await
        .map_err(|e| AppError::Internal(format!("document task panicked: {}", e)))?
}

pub async fn contrato_pdf(
    State(state): State<AppState>,
    Path(cotizacion_id): Path<i64>,
) -> impl IntoResponse {
    match render_contrato(&state, cotizacion_id).await {
        Ok(pdf) => attachment(
            "application/pdf",
            &format!("contrato-{}.pdf", cotizacion_id),
            pdf,
        ),
        Err(e) => e.into_response(),
    }
}

async fn render_rotulado_zip(state: &AppState, cotizacion_id: i64) -> AppResult<(String, Vec<u8>)> {
    let cotizaciones = CotizacionService::new(state.db.clone());
    let cotizacion = cotizaciones.get_cotizacion(cotizacion_id).await?;
    let proveedores = cotizaciones.list_proveedores(cotizacion_id).await?;
    let contenedor = cotizaciones.contenedor_for(&cotizacion).await?;

    let documents = DocumentService::new(&state.config.documents);
    tokio::task::spawn_blocking(move || {
        documents.rotulado_zip(&cotizacion, &proveedores, contenedor.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("document task panicked: {}", e)))?
}

pub async fn rotulado_zip(
    State(state): State<AppState>,
    Path(cotizacion_id): Path<i64>,
) -> impl IntoResponse {
    match render_rotulado_zip(&state, cotizacion_id).await {
        Ok((name, zip)) => attachment("application/zip", &name, zip),
        Err(e) => e.into_response(),
    }
}
