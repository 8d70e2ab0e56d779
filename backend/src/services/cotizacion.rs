//! Read access to quotations, containers and their supplier lines

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{
    Contenedor, ContenedorRow, Cotizacion, CotizacionProveedor, CotizacionRow, InspectionMedia,
    InspectionRow, Payment, PaymentRow, ProveedorRow, CONTENEDOR_COLUMNS, COTIZACION_COLUMNS,
    INSPECTION_COLUMNS, MEDIA_SENDED, PAYMENT_COLUMNS, PROVEEDOR_COLUMNS, ROTULADO_SENDED,
};

/// Quotation service: loads the aggregates jobs and commands work on
#[derive(Clone)]
pub struct CotizacionService {
    db: PgPool,
}

impl CotizacionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_cotizacion(&self, id: i64) -> AppResult<Cotizacion> {
        let row = sqlx::query_as::<_, CotizacionRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion WHERE id = $1 AND deleted_at IS NULL",
            COTIZACION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cotizacion {}", id)))?;

        Ok(row.into())
    }

    pub async fn get_contenedor(&self, id: i64) -> AppResult<Contenedor> {
        let row = sqlx::query_as::<_, ContenedorRow>(&format!(
            "SELECT {} FROM contenedor_consolidado WHERE id = $1",
            CONTENEDOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contenedor {}", id)))?;

        Ok(row.into())
    }

    /// Container of a quotation, if it has one
    pub async fn contenedor_for(&self, cotizacion: &Cotizacion) -> AppResult<Option<Contenedor>> {
        match cotizacion.id_contenedor {
            Some(id) => match self.get_contenedor(id).await {
                Ok(c) => Ok(Some(c)),
                Err(AppError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    pub async fn list_by_contenedor(&self, contenedor_id: i64) -> AppResult<Vec<Cotizacion>> {
        let rows = sqlx::query_as::<_, CotizacionRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion \
             WHERE id_contenedor = $1 AND deleted_at IS NULL ORDER BY id",
            COTIZACION_COLUMNS
        ))
        .bind(contenedor_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_proveedor(&self, id: i64) -> AppResult<CotizacionProveedor> {
        let row = sqlx::query_as::<_, ProveedorRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion_proveedores WHERE id = $1",
            PROVEEDOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", id)))?;

        Ok(row.into())
    }

    pub async fn list_proveedores(&self, cotizacion_id: i64) -> AppResult<Vec<CotizacionProveedor>> {
        let rows = sqlx::query_as::<_, ProveedorRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion_proveedores \
             WHERE id_cotizacion = $1 ORDER BY id",
            PROVEEDOR_COLUMNS
        ))
        .bind(cotizacion_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Supplier lines of a quotation, restricted to `ids` when non-empty
    pub async fn select_proveedores(
        &self,
        cotizacion_id: i64,
        ids: &[i64],
    ) -> AppResult<Vec<CotizacionProveedor>> {
        let all = self.list_proveedores(cotizacion_id).await?;
        if ids.is_empty() {
            return Ok(all);
        }

        let selected: Vec<CotizacionProveedor> =
            all.into_iter().filter(|p| ids.contains(&p.id)).collect();
        if let Some(missing) = ids.iter().find(|id| !selected.iter().any(|p| p.id == **id)) {
            return Err(AppError::NotFound(format!(
                "Proveedor {} in cotizacion {}",
                missing, cotizacion_id
            )));
        }
        Ok(selected)
    }

    pub async fn list_payments(&self, cotizacion_id: i64) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion_coordinacion_pagos \
             WHERE id_cotizacion = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS
        ))
        .bind(cotizacion_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_pending_inspection_media(
        &self,
        proveedor_id: i64,
    ) -> AppResult<Vec<InspectionMedia>> {
        let rows = sqlx::query_as::<_, InspectionRow>(&format!(
            "SELECT {} FROM almacen_inspection \
             WHERE id_proveedor = $1 AND (send_status IS NULL OR send_status <> $2) \
             ORDER BY created_at, id",
            INSPECTION_COLUMNS
        ))
        .bind(proveedor_id)
        .bind(MEDIA_SENDED)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn mark_inspection_media_sent(&self, media_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE almacen_inspection SET send_status = $2 WHERE id = $1")
            .bind(media_id)
            .bind(MEDIA_SENDED)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_rotulado_sent(&self, proveedor_id: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE contenedor_consolidado_cotizacion_proveedores \
             SET send_rotulado_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(proveedor_id)
        .bind(ROTULADO_SENDED)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Coordination status string shown to the operations team
    pub async fn set_estados_proveedor(&self, proveedor_id: i64, value: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE contenedor_consolidado_cotizacion_proveedores \
             SET estados_proveedor = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(proveedor_id)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
