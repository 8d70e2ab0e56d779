//! Route definitions for the Freight Ops API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .merge(protected_routes(state))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/proveedores", proveedor_routes())
        .nest("/cotizaciones", cotizacion_routes())
        .nest("/pedidos-curso", curso_routes())
        .nest("/jobs", job_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Supplier status routes
fn proveedor_routes() -> Router<AppState> {
    Router::new()
        .route("/:proveedor_id/status", get(handlers::get_status))
        .route("/:proveedor_id/recompute", post(handlers::recompute))
        .route("/:proveedor_id/transition", post(handlers::transition))
        .route("/:proveedor_id/tracking", get(handlers::tracking_history))
        .route("/:proveedor_id/inspection", post(handlers::enqueue_inspection))
}

/// Quotation documents and dispatch
fn cotizacion_routes() -> Router<AppState> {
    Router::new()
        .route("/:cotizacion_id/rotulado", post(handlers::enqueue_rotulado))
        .route("/:cotizacion_id/contrato.pdf", get(handlers::contrato_pdf))
        .route("/:cotizacion_id/rotulado.zip", get(handlers::rotulado_zip))
}

fn curso_routes() -> Router<AppState> {
    Router::new().route("/:pedido_curso_id/constancia.pdf", get(handlers::constancia_pdf))
}

fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::enqueue_job))
        .route("/:job_id", get(handlers::get_job))
}
