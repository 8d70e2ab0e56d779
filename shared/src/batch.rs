//! Planning helpers for batch repair commands
//!
//! Every batch command computes its decisions with the functions here and
//! only then decides whether to persist them. Dry-run and real runs share
//! the planner, so a dry-run report is exactly what a real run would do.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CotizacionProveedor, Payment, TrackingEntry};
use crate::status::{determine_new_status, ProviderStatus};

/// Statuses `sync-tracking` is allowed to rewrite
pub const REPAIRABLE_STATUSES: [ProviderStatus; 5] = [
    ProviderStatus::Reservado,
    ProviderStatus::Cobrando,
    ProviderStatus::Nc,
    ProviderStatus::C,
    ProviderStatus::Wait,
];

/// A single planned change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDecision {
    pub entity_id: i64,
    pub from: Option<String>,
    pub to: String,
    pub reason: String,
}

/// Outcome of a batch command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub decisions: Vec<BatchDecision>,
}

impl BatchReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Status the `update-estados-proveedor` command would assign.
///
/// Only providers still in a pre-arrival state or without a status are
/// touched; later stages are owned by the warehouse and job pipeline.
pub fn plan_rule_status(provider: &CotizacionProveedor) -> Option<BatchDecision> {
    if let Some(current) = provider.estados {
        if !current.is_pre_arrival() {
            return None;
        }
    }

    let next = determine_new_status(&provider.snapshot());
    if provider.estados == Some(next) {
        return None;
    }

    Some(BatchDecision {
        entity_id: provider.id,
        from: provider.estados.map(|s| s.as_str().to_string()),
        to: next.as_str().to_string(),
        reason: "derived from box, volume and supplier fields".to_string(),
    })
}

/// Status `sync-tracking` would assign given the quotation's payments.
///
/// - `RESERVADO`/`COBRANDO`: a confirmed logistics payment means
///   `RESERVADO`, otherwise a pending payment means `COBRANDO`, otherwise
///   fall back to the field rule
/// - `WAIT`/`NC`/`C`: the field rule
/// - anything else: untouched
pub fn plan_payment_status(
    provider: &CotizacionProveedor,
    payments: &[Payment],
) -> Option<BatchDecision> {
    let current = provider.estados?;
    if !REPAIRABLE_STATUSES.contains(&current) {
        return None;
    }

    let relevant: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.id_cotizacion == provider.id_cotizacion)
        .filter(|p| p.id_proveedor.map(|id| id == provider.id).unwrap_or(true))
        .collect();

    let (next, reason) = match current {
        ProviderStatus::Reservado | ProviderStatus::Cobrando => {
            if relevant.iter().any(|p| p.is_logistics() && p.is_confirmed()) {
                (ProviderStatus::Reservado, "confirmed logistics payment")
            } else if relevant.iter().any(|p| p.is_pending()) {
                (ProviderStatus::Cobrando, "pending payment")
            } else {
                (
                    determine_new_status(&provider.snapshot()),
                    "no payments, derived from fields",
                )
            }
        }
        _ => (
            determine_new_status(&provider.snapshot()),
            "derived from fields",
        ),
    };

    if next == current {
        return None;
    }

    Some(BatchDecision {
        entity_id: provider.id,
        from: Some(current.as_str().to_string()),
        to: next.as_str().to_string(),
        reason: reason.to_string(),
    })
}

/// Fill for a legacy tracking row whose `estado` was never written.
///
/// The provider's authoritative status is the only trustworthy value; rows
/// of providers without one are left alone.
pub fn plan_tracking_fill(
    entry: &TrackingEntry,
    provider_status: Option<ProviderStatus>,
) -> Option<BatchDecision> {
    if !entry.estado.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return None;
    }
    let status = provider_status?;

    Some(BatchDecision {
        entity_id: entry.id,
        from: None,
        to: status.as_str().to_string(),
        reason: format!("null estado, provider {} is {}", entry.id_proveedor, status),
    })
}

/// Assign a fresh v4 UUID to each row id.
///
/// UUIDs are regenerated on the (practically impossible) collision so the
/// plan always holds distinct values.
pub fn plan_uuid_backfill(ids: &[i64]) -> Vec<(i64, String)> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter()
        .map(|id| {
            let mut uuid = Uuid::new_v4();
            while !seen.insert(uuid) {
                uuid = Uuid::new_v4();
            }
            (*id, uuid.to_string())
        })
        .collect()
}

/// Whether a stored uuid column counts as missing
pub fn uuid_missing(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn provider(estados: Option<ProviderStatus>) -> CotizacionProveedor {
        CotizacionProveedor {
            id: 7,
            uuid: None,
            id_cotizacion: 70,
            id_contenedor: Some(1),
            code_supplier: Some("BRU-7".to_string()),
            products: None,
            supplier: Some("ACME".to_string()),
            supplier_phone: Some("123".to_string()),
            qty_box: None,
            cbm_total: None,
            qty_box_china: Some(0),
            cbm_total_china: Some(Decimal::ZERO),
            arrive_date_china: Some("2024-05-01".to_string()),
            estados,
            estados_proveedor: None,
            send_rotulado_status: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(concepto: &str, status: &str) -> Payment {
        Payment {
            id: 1,
            id_cotizacion: 70,
            id_proveedor: None,
            monto: Decimal::from(100),
            concepto: concepto.to_string(),
            status: status.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rule_plan_moves_wait_to_c() {
        let decision = plan_rule_status(&provider(Some(ProviderStatus::Wait))).unwrap();
        assert_eq!(decision.from.as_deref(), Some("WAIT"));
        assert_eq!(decision.to, "C");
    }

    #[test]
    fn test_rule_plan_skips_unchanged_and_late_stages() {
        assert!(plan_rule_status(&provider(Some(ProviderStatus::C))).is_none());
        assert!(plan_rule_status(&provider(Some(ProviderStatus::Rotulado))).is_none());
    }

    #[test]
    fn test_rule_plan_fills_missing_status() {
        let decision = plan_rule_status(&provider(None)).unwrap();
        assert_eq!(decision.from, None);
        assert_eq!(decision.to, "C");
    }

    #[test]
    fn test_confirmed_logistics_keeps_reservado() {
        let p = provider(Some(ProviderStatus::Cobrando));
        let decision = plan_payment_status(&p, &[payment("LOGISTICA", "CONFIRMADO")]).unwrap();
        assert_eq!(decision.to, "RESERVADO");
    }

    #[test]
    fn test_pending_payment_means_cobrando() {
        let p = provider(Some(ProviderStatus::Reservado));
        let decision = plan_payment_status(&p, &[payment("IMPUESTOS", "PENDIENTE")]).unwrap();
        assert_eq!(decision.to, "COBRANDO");
    }

    #[test]
    fn test_payments_of_other_quotations_ignored() {
        let p = provider(Some(ProviderStatus::Reservado));
        let mut other = payment("LOGISTICA", "CONFIRMADO");
        other.id_cotizacion = 71;
        let decision = plan_payment_status(&p, &[other]).unwrap();
        assert_eq!(decision.to, "C");
    }

    #[test]
    fn test_inspection_not_repairable() {
        let p = provider(Some(ProviderStatus::Inspection));
        assert!(plan_payment_status(&p, &[]).is_none());
    }

    fn tracking(estado: Option<&str>) -> TrackingEntry {
        TrackingEntry {
            id: 3,
            id_proveedor: 7,
            id_cotizacion: 70,
            estado: estado.map(str::to_string),
            previous_estado: None,
            version: None,
            source: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tracking_fill_uses_provider_status() {
        let decision =
            plan_tracking_fill(&tracking(Some(" ")), Some(ProviderStatus::Cobrando)).unwrap();
        assert_eq!(decision.entity_id, 3);
        assert_eq!(decision.to, "COBRANDO");

        assert!(plan_tracking_fill(&tracking(None), None).is_none());
        assert!(plan_tracking_fill(&tracking(Some("R")), Some(ProviderStatus::C)).is_none());
    }

    #[test]
    fn test_uuid_missing() {
        assert!(uuid_missing(None));
        assert!(uuid_missing(Some("  ")));
        assert!(!uuid_missing(Some("4f1c0c7e-0000-4000-8000-000000000000")));
    }
}
