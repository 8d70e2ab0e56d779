//! Data access used by job handlers
//!
//! Handlers go through [`JobStore`] rather than the services directly, so
//! a handler can run against an in-memory store next to a fake gateway.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{
    Contenedor, Cotizacion, CotizacionProveedor, InspectionMedia, Payment, PedidoCurso,
    StatusSource,
};
use crate::services::provider_status::TransitionOutcome;
use crate::services::{CotizacionService, CursoService, ProviderStatusService};
use shared::ProviderStatus;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_cotizacion(&self, id: i64) -> AppResult<Cotizacion>;

    async fn contenedor_for(&self, cotizacion: &Cotizacion) -> AppResult<Option<Contenedor>>;

    async fn get_contenedor(&self, id: i64) -> AppResult<Contenedor>;

    async fn list_by_contenedor(&self, contenedor_id: i64) -> AppResult<Vec<Cotizacion>>;

    async fn get_proveedor(&self, id: i64) -> AppResult<CotizacionProveedor>;

    async fn list_proveedores(&self, cotizacion_id: i64) -> AppResult<Vec<CotizacionProveedor>>;

    /// Supplier lines of a quotation, restricted to `ids` when non-empty
    async fn select_proveedores(
        &self,
        cotizacion_id: i64,
        ids: &[i64],
    ) -> AppResult<Vec<CotizacionProveedor>>;

    async fn list_payments(&self, cotizacion_id: i64) -> AppResult<Vec<Payment>>;

    async fn list_pending_inspection_media(
        &self,
        proveedor_id: i64,
    ) -> AppResult<Vec<InspectionMedia>>;

    async fn mark_inspection_media_sent(&self, media_id: i64) -> AppResult<()>;

    async fn mark_rotulado_sent(&self, proveedor_id: i64) -> AppResult<()>;

    async fn set_estados_proveedor(&self, proveedor_id: i64, value: &str) -> AppResult<()>;

    /// Authoritative status write against the current version
    async fn transition_latest(
        &self,
        proveedor_id: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome>;

    async fn get_pedido(&self, id: i64) -> AppResult<PedidoCurso>;

    async fn save_moodle_credentials(
        &self,
        id: i64,
        moodle_user_id: i64,
        username: &str,
        password: &str,
    ) -> AppResult<()>;

    async fn mark_enrolled(&self, id: i64) -> AppResult<()>;
}

/// [`JobStore`] backed by the PostgreSQL services
#[derive(Clone)]
pub struct PgJobStore {
    cotizaciones: CotizacionService,
    status: ProviderStatusService,
    cursos: CursoService,
}

impl PgJobStore {
    pub fn new(db: PgPool) -> Self {
        Self {
            cotizaciones: CotizacionService::new(db.clone()),
            status: ProviderStatusService::new(db.clone()),
            cursos: CursoService::new(db),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get_cotizacion(&self, id: i64) -> AppResult<Cotizacion> {
        self.cotizaciones.get_cotizacion(id).await
    }

    async fn contenedor_for(&self, cotizacion: &Cotizacion) -> AppResult<Option<Contenedor>> {
        self.cotizaciones.contenedor_for(cotizacion).await
    }

    async fn get_contenedor(&self, id: i64) -> AppResult<Contenedor> {
        self.cotizaciones.get_contenedor(id).await
    }

    async fn list_by_contenedor(&self, contenedor_id: i64) -> AppResult<Vec<Cotizacion>> {
        self.cotizaciones.list_by_contenedor(contenedor_id).await
    }

    async fn get_proveedor(&self, id: i64) -> AppResult<CotizacionProveedor> {
        self.cotizaciones.get_proveedor(id).await
    }

    async fn list_proveedores(&self, cotizacion_id: i64) -> AppResult<Vec<CotizacionProveedor>> {
        self.cotizaciones.list_proveedores(cotizacion_id).await
    }

    async fn select_proveedores(
        &self,
        cotizacion_id: i64,
        ids: &[i64],
    ) -> AppResult<Vec<CotizacionProveedor>> {
        self.cotizaciones.select_proveedores(cotizacion_id, ids).await
    }

    async fn list_payments(&self, cotizacion_id: i64) -> AppResult<Vec<Payment>> {
        self.cotizaciones.list_payments(cotizacion_id).await
    }

    async fn list_pending_inspection_media(
        &self,
        proveedor_id: i64,
    ) -> AppResult<Vec<InspectionMedia>> {
        self.cotizaciones
            .list_pending_inspection_media(proveedor_id)
            .await
    }

    async fn mark_inspection_media_sent(&self, media_id: i64) -> AppResult<()> {
        self.cotizaciones.mark_inspection_media_sent(media_id).await
    }

    async fn mark_rotulado_sent(&self, proveedor_id: i64) -> AppResult<()> {
        self.cotizaciones.mark_rotulado_sent(proveedor_id).await
    }

    async fn set_estados_proveedor(&self, proveedor_id: i64, value: &str) -> AppResult<()> {
        self.cotizaciones
            .set_estados_proveedor(proveedor_id, value)
            .await
    }

    async fn transition_latest(
        &self,
        proveedor_id: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome> {
        self.status
            .transition_latest(proveedor_id, target, source, force)
            .await
    }

    async fn get_pedido(&self, id: i64) -> AppResult<PedidoCurso> {
        self.cursos.get_pedido(id).await
    }

    async fn save_moodle_credentials(
        &self,
        id: i64,
        moodle_user_id: i64,
        username: &str,
        password: &str,
    ) -> AppResult<()> {
        self.cursos
            .save_moodle_credentials(id, moodle_user_id, username, password)
            .await
    }

    async fn mark_enrolled(&self, id: i64) -> AppResult<()> {
        self.cursos.mark_enrolled(id).await
    }
}
