//! Coordination payment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const CONCEPTO_LOGISTICA: &str = "LOGISTICA";
pub const PAYMENT_CONFIRMED: &str = "CONFIRMADO";
pub const PAYMENT_PENDING: &str = "PENDIENTE";

/// A payment recorded against a quotation (optionally a single supplier)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub id_cotizacion: i64,
    pub id_proveedor: Option<i64>,
    pub monto: Decimal,
    pub concepto: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_confirmed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(PAYMENT_CONFIRMED)
    }

    pub fn is_pending(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(PAYMENT_PENDING)
    }

    pub fn is_logistics(&self) -> bool {
        self.concepto.trim().eq_ignore_ascii_case(CONCEPTO_LOGISTICA)
    }
}
