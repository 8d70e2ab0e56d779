//! Batch repair of provider statuses and their tracking rows
//!
//! Each command plans its decisions with the pure planners in
//! `shared::batch`, logs them, and only writes when not in dry-run mode.
//! Rows are processed one at a time: a failing row is logged and counted
//! and the batch carries on.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{
    CotizacionProveedor, Payment, PaymentRow, ProveedorRow, StatusSource, TrackingRow,
    PAYMENT_COLUMNS, PROVEEDOR_COLUMNS, TRACKING_COLUMNS,
};
use crate::services::provider_status::{ProviderStatusService, StatusWriter};
use shared::batch::{
    plan_payment_status, plan_rule_status, plan_tracking_fill, BatchDecision, BatchReport,
    REPAIRABLE_STATUSES,
};
use shared::ProviderStatus;

/// Options shared by the batch commands
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BatchOptions {
    /// Restrict to one container
    pub contenedor_id: Option<i64>,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct TrackingService {
    db: PgPool,
    status: Arc<dyn StatusWriter>,
}

/// Keep providers whose parsed status is one of `statuses`.
///
/// Stored statuses are free text (`" nc "`, `reservado`); they are matched
/// after parsing rather than as raw strings.
pub fn retain_statuses(
    proveedores: Vec<CotizacionProveedor>,
    statuses: &[ProviderStatus],
) -> Vec<CotizacionProveedor> {
    proveedores
        .into_iter()
        .filter(|p| p.estados.map_or(false, |s| statuses.contains(&s)))
        .collect()
}

/// Persist one provider decision unless dry-run
async fn apply_status(
    status: &dyn StatusWriter,
    report: &mut BatchReport,
    proveedor: &CotizacionProveedor,
    decision: BatchDecision,
    source: StatusSource,
) {
    tracing::info!(
        proveedor_id = proveedor.id,
        from = ?decision.from,
        to = %decision.to,
        reason = %decision.reason,
        dry_run = report.dry_run,
        "Planned status change"
    );

    if report.dry_run {
        report.changed += 1;
        report.decisions.push(decision);
        return;
    }

    let result = match ProviderStatus::parse(&decision.to) {
        Some(target) => {
            status
                .transition(proveedor.id, proveedor.version, target, source, true)
                .await
        }
        None => Err(AppError::Internal(format!("unknown status {}", decision.to))),
    };

    match result {
        Ok(_) => report.changed += 1,
        Err(e) => {
            tracing::warn!(proveedor_id = proveedor.id, error = %e, "Status update failed");
            report.failed += 1;
        }
    }
    report.decisions.push(decision);
}

impl TrackingService {
    pub fn new(db: PgPool) -> Self {
        Self {
            status: Arc::new(ProviderStatusService::new(db.clone())),
            db,
        }
    }

    async fn load_proveedores(
        &self,
        contenedor_id: Option<i64>,
        statuses: Option<&[ProviderStatus]>,
    ) -> AppResult<Vec<CotizacionProveedor>> {
        let rows = sqlx::query_as::<_, ProveedorRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion_proveedores \
             WHERE ($1::BIGINT IS NULL OR id_contenedor = $1) \
             ORDER BY id",
            PROVEEDOR_COLUMNS
        ))
        .bind(contenedor_id)
        .fetch_all(&self.db)
        .await?;

        let proveedores: Vec<CotizacionProveedor> = rows.into_iter().map(Into::into).collect();
        Ok(match statuses {
            Some(statuses) => retain_statuses(proveedores, statuses),
            None => proveedores,
        })
    }

    async fn payments_for(&self, cotizacion_id: i64) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM contenedor_consolidado_cotizacion_coordinacion_pagos \
             WHERE id_cotizacion = $1",
            PAYMENT_COLUMNS
        ))
        .bind(cotizacion_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Apply the field rule to every provider still before arrival
    pub async fn update_provider_states(&self, options: BatchOptions) -> AppResult<BatchReport> {
        let proveedores = self.load_proveedores(options.contenedor_id, None).await?;
        let mut report = BatchReport::new(options.dry_run);

        for proveedor in &proveedores {
            report.scanned += 1;
            match plan_rule_status(proveedor) {
                Some(decision) => {
                    apply_status(
                        self.status.as_ref(),
                        &mut report,
                        proveedor,
                        decision,
                        StatusSource::UpdateEstadosCommand,
                    )
                    .await
                }
                None => report.skipped += 1,
            }
        }

        tracing::info!(
            scanned = report.scanned,
            changed = report.changed,
            failed = report.failed,
            dry_run = report.dry_run,
            "update-estados-proveedor finished"
        );
        Ok(report)
    }

    /// Re-derive repairable statuses from each quotation's payments
    pub async fn sync_tracking_to_providers(&self, options: BatchOptions) -> AppResult<BatchReport> {
        let proveedores = self
            .load_proveedores(options.contenedor_id, Some(&REPAIRABLE_STATUSES[..]))
            .await?;
        let mut report = BatchReport::new(options.dry_run);
        let mut payments: HashMap<i64, Vec<Payment>> = HashMap::new();

        for proveedor in &proveedores {
            report.scanned += 1;

            if !payments.contains_key(&proveedor.id_cotizacion) {
                match self.payments_for(proveedor.id_cotizacion).await {
                    Ok(list) => {
                        payments.insert(proveedor.id_cotizacion, list);
                    }
                    Err(e) => {
                        tracing::warn!(
                            proveedor_id = proveedor.id,
                            cotizacion_id = proveedor.id_cotizacion,
                            error = %e,
                            "Could not load payments"
                        );
                        report.failed += 1;
                        continue;
                    }
                }
            }
            let list = payments
                .get(&proveedor.id_cotizacion)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            match plan_payment_status(proveedor, list) {
                Some(decision) => {
                    apply_status(
                        self.status.as_ref(),
                        &mut report,
                        proveedor,
                        decision,
                        StatusSource::SyncTrackingCommand,
                    )
                    .await
                }
                None => report.skipped += 1,
            }
        }

        tracing::info!(
            scanned = report.scanned,
            changed = report.changed,
            failed = report.failed,
            dry_run = report.dry_run,
            "sync-tracking finished"
        );
        Ok(report)
    }

    /// Fill tracking rows with a null `estado` from the provider's status
    pub async fn fix_null_tracking_states(&self, options: BatchOptions) -> AppResult<BatchReport> {
        let rows = sqlx::query_as::<_, TrackingRow>(&format!(
            "SELECT {} FROM contenedor_proveedor_estados_tracking t \
             WHERE (t.estado IS NULL OR TRIM(t.estado) = '') \
               AND ($1::BIGINT IS NULL OR EXISTS ( \
                   SELECT 1 FROM contenedor_consolidado_cotizacion_proveedores p \
                   WHERE p.id = t.id_proveedor AND p.id_contenedor = $1)) \
             ORDER BY t.id",
            TRACKING_COLUMNS
                .split(", ")
                .map(|c| format!("t.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(options.contenedor_id)
        .fetch_all(&self.db)
        .await?;

        let mut report = BatchReport::new(options.dry_run);
        let mut statuses: HashMap<i64, Option<ProviderStatus>> = HashMap::new();

        for row in rows {
            let entry: shared::TrackingEntry = row.into();
            report.scanned += 1;

            let status = match statuses.get(&entry.id_proveedor) {
                Some(s) => *s,
                None => {
                    let fetched: Option<Option<String>> = match sqlx::query_scalar(
                        "SELECT estados FROM contenedor_consolidado_cotizacion_proveedores WHERE id = $1",
                    )
                    .bind(entry.id_proveedor)
                    .fetch_optional(&self.db)
                    .await
                    {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(tracking_id = entry.id, error = %e, "Could not load provider");
                            report.failed += 1;
                            continue;
                        }
                    };
                    let parsed = fetched.flatten().as_deref().and_then(ProviderStatus::parse);
                    statuses.insert(entry.id_proveedor, parsed);
                    parsed
                }
            };

            let Some(decision) = plan_tracking_fill(&entry, status) else {
                tracing::warn!(
                    tracking_id = entry.id,
                    proveedor_id = entry.id_proveedor,
                    "Provider has no status, tracking row left empty"
                );
                report.skipped += 1;
                continue;
            };

            tracing::info!(
                tracking_id = entry.id,
                to = %decision.to,
                dry_run = report.dry_run,
                "Planned tracking fill"
            );

            if report.dry_run {
                report.changed += 1;
                report.decisions.push(decision);
                continue;
            }

            let result = sqlx::query(
                "UPDATE contenedor_proveedor_estados_tracking \
                 SET estado = $2, updated_at = NOW() \
                 WHERE id = $1 AND (estado IS NULL OR TRIM(estado) = '')",
            )
            .bind(entry.id)
            .bind(&decision.to)
            .execute(&self.db)
            .await;

            match result {
                Ok(_) => report.changed += 1,
                Err(e) => {
                    tracing::warn!(tracking_id = entry.id, error = %e, "Tracking fill failed");
                    report.failed += 1;
                }
            }
            report.decisions.push(decision);
        }

        tracing::info!(
            scanned = report.scanned,
            changed = report.changed,
            failed = report.failed,
            dry_run = report.dry_run,
            "fix-tracking-nulos finished"
        );
        Ok(report)
    }
}

/// Write a report's decisions as CSV
pub fn write_report_csv<W: Write>(report: &BatchReport, writer: W) -> AppResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["entity_id", "from", "to", "reason", "dry_run"])
        .map_err(|e| AppError::Document(e.to_string()))?;

    for decision in &report.decisions {
        csv.write_record([
            decision.entity_id.to_string(),
            decision.from.clone().unwrap_or_default(),
            decision.to.clone(),
            decision.reason.clone(),
            report.dry_run.to_string(),
        ])
        .map_err(|e| AppError::Document(e.to_string()))?;
    }

    csv.flush()?;
    Ok(())
}
