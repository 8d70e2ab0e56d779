//! Course certificate handler

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use super::cotizacion::attachment;
use crate::services::CursoService;
use crate::AppState;

pub async fn constancia_pdf(
    State(state): State<AppState>,
    Path(pedido_curso_id): Path<i64>,
) -> impl IntoResponse {
    let result = CursoService::new(state.db.clone())
        .render_constancia(&state.config, pedido_curso_id)
        .await;

    match result {
        Ok(pdf) => attachment(
            "application/pdf",
            &format!("constancia-{}.pdf", pedido_curso_id),
            pdf,
        ),
        Err(e) => e.into_response(),
    }
}
