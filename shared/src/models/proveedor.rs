//! Quotation supplier line models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::status::{ProviderSnapshot, ProviderStatus};

/// Value of `send_rotulado_status` once the labelling document went out
pub const ROTULADO_SENDED: &str = "SENDED";

/// One supplier contributing goods to a quotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CotizacionProveedor {
    pub id: i64,
    pub uuid: Option<String>,
    pub id_cotizacion: i64,
    pub id_contenedor: Option<i64>,
    pub code_supplier: Option<String>,
    pub products: Option<String>,
    pub supplier: Option<String>,
    pub supplier_phone: Option<String>,
    pub qty_box: Option<i32>,
    pub cbm_total: Option<Decimal>,
    pub qty_box_china: Option<i32>,
    pub cbm_total_china: Option<Decimal>,
    pub arrive_date_china: Option<String>,
    /// Authoritative provider status; `None` on legacy rows
    pub estados: Option<ProviderStatus>,
    pub estados_proveedor: Option<String>,
    pub send_rotulado_status: Option<String>,
    /// Optimistic concurrency counter, bumped on every status write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CotizacionProveedor {
    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            qty_box_china: self.qty_box_china,
            cbm_total_china: self.cbm_total_china,
            supplier: self.supplier.clone(),
            supplier_phone: self.supplier_phone.clone(),
            arrive_date_china: self.arrive_date_china.clone(),
            current: self.estados,
        }
    }

    /// Label used in file names and messages
    pub fn display_code(&self) -> String {
        self.code_supplier
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| format!("PROV-{}", self.id))
    }

    pub fn rotulado_sent(&self) -> bool {
        self.send_rotulado_status.as_deref() == Some(ROTULADO_SENDED)
    }
}
