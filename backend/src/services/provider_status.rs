//! Authoritative provider status writes
//!
//! `estados` on the provider row is the single source of truth. Every write
//! is a compare-and-swap on `version`, and the audit row is inserted in the
//! same transaction with the version it records, so the tracking table is
//! derived from the status instead of being written independently.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{
    CotizacionProveedor, ProveedorRow, StatusSource, TrackingEntry, TrackingRow, TRACKING_COLUMNS,
};
use shared::{determine_new_status, ProviderStatus};

// Static so it can run on any executor, including an open transaction
const SELECT_PROVEEDOR: &str = "SELECT id, uuid, id_cotizacion, id_contenedor, code_supplier, \
     products, supplier, supplier_phone, qty_box, cbm_total, qty_box_china, cbm_total_china, \
     arrive_date_china, estados, estados_proveedor, send_rotulado_status, version, \
     created_at, updated_at \
     FROM contenedor_consolidado_cotizacion_proveedores WHERE id = $1";

#[derive(Clone)]
pub struct ProviderStatusService {
    db: PgPool,
}

/// Result of a status write
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub proveedor_id: i64,
    pub previous: Option<ProviderStatus>,
    pub current: ProviderStatus,
    pub version: i64,
    /// False when the provider already had the target status
    pub changed: bool,
}

/// Current status with the newest audit row
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub proveedor_id: i64,
    pub estados: Option<ProviderStatus>,
    pub version: i64,
    pub latest: Option<TrackingEntry>,
}

impl ProviderStatusService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn load<'e, E>(executor: E, id: i64) -> AppResult<CotizacionProveedor>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, ProveedorRow>(SELECT_PROVEEDOR)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", id)))?;

        Ok(row.into())
    }

    /// Move a provider to `target` if its version is still `expected_version`.
    ///
    /// Illegal transitions are rejected unless `force` is set. Writing the
    /// status it already has is a no-op and leaves no audit row.
    pub async fn transition(
        &self,
        id: i64,
        expected_version: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.db.begin().await?;

        let current = Self::load(&mut *tx, id).await?;
        if current.version != expected_version {
            return Err(AppError::stale_version(
                &format!("Proveedor {}", id),
                expected_version,
            ));
        }

        if current.estados == Some(target) {
            return Ok(TransitionOutcome {
                proveedor_id: id,
                previous: current.estados,
                current: target,
                version: current.version,
                changed: false,
            });
        }

        if let Some(from) = current.estados {
            if !force && !from.can_transition_to(target) {
                return Err(AppError::InvalidStateTransition(format!(
                    "Proveedor {}: {} -> {}",
                    id, from, target
                )));
            }
        }

        let new_version: Option<i64> = sqlx::query_scalar(
            "UPDATE contenedor_consolidado_cotizacion_proveedores \
             SET estados = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 \
             RETURNING version",
        )
        .bind(id)
        .bind(expected_version)
        .bind(target.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let new_version = new_version.ok_or_else(|| {
            AppError::stale_version(&format!("Proveedor {}", id), expected_version)
        })?;

        sqlx::query(
            "INSERT INTO contenedor_proveedor_estados_tracking \
             (id_proveedor, id_cotizacion, estado, previous_estado, version, source, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())",
        )
        .bind(id)
        .bind(current.id_cotizacion)
        .bind(target.as_str())
        .bind(current.estados.map(|s| s.as_str()))
        .bind(new_version)
        .bind(source.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            proveedor_id = id,
            from = ?current.estados,
            to = %target,
            version = new_version,
            source = source.as_str(),
            "Provider status changed"
        );

        Ok(TransitionOutcome {
            proveedor_id: id,
            previous: current.estados,
            current: target,
            version: new_version,
            changed: true,
        })
    }

    /// Transition against whatever version is current.
    ///
    /// Used by jobs; a concurrent writer between the read and the write
    /// still surfaces as a conflict and the job is retried.
    pub async fn transition_latest(
        &self,
        id: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome> {
        let version: i64 = sqlx::query_scalar(
            "SELECT version FROM contenedor_consolidado_cotizacion_proveedores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", id)))?;

        self.transition(id, version, target, source, force).await
    }

    /// Re-derive the status from the row's fields and store it if different
    pub async fn recompute(&self, id: i64, source: StatusSource) -> AppResult<TransitionOutcome> {
        let proveedor = Self::load(&self.db, id).await?;

        let derived = determine_new_status(&proveedor.snapshot());
        self.transition(id, proveedor.version, derived, source, true)
            .await
    }

    pub async fn current_status(&self, id: i64) -> AppResult<StatusView> {
        let (estados, version): (Option<String>, i64) = sqlx::query_as(
            "SELECT estados, version FROM contenedor_consolidado_cotizacion_proveedores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", id)))?;

        let latest = sqlx::query_as::<_, TrackingRow>(&format!(
            "SELECT {} FROM contenedor_proveedor_estados_tracking \
             WHERE id_proveedor = $1 \
             ORDER BY version DESC NULLS LAST, created_at DESC, id DESC LIMIT 1",
            TRACKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(StatusView {
            proveedor_id: id,
            estados: estados.as_deref().and_then(ProviderStatus::parse),
            version,
            latest: latest.map(Into::into),
        })
    }

    /// Full audit history, oldest first; legacy unversioned rows lead
    pub async fn history(&self, id: i64) -> AppResult<Vec<TrackingEntry>> {
        let rows = sqlx::query_as::<_, TrackingRow>(&format!(
            "SELECT {} FROM contenedor_proveedor_estados_tracking \
             WHERE id_proveedor = $1 \
             ORDER BY version ASC NULLS FIRST, created_at ASC, id ASC",
            TRACKING_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Versioned status writes, as used by the batch commands
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn transition(
        &self,
        id: i64,
        expected_version: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome>;
}

#[async_trait]
impl StatusWriter for ProviderStatusService {
    async fn transition(
        &self,
        id: i64,
        expected_version: i64,
        target: ProviderStatus,
        source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome> {
        ProviderStatusService::transition(self, id, expected_version, target, source, force).await
    }
}
