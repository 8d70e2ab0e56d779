//! Provider status audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `contenedor_proveedor_estados_tracking`.
///
/// Rows written by this service carry the provider `version` they record,
/// which orders the history. Legacy rows have no version and may have a
/// null `estado`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: i64,
    pub id_proveedor: i64,
    pub id_cotizacion: i64,
    pub estado: Option<String>,
    pub previous_estado: Option<String>,
    pub version: Option<i64>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who produced a status change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Api,
    Recompute,
    UpdateEstadosCommand,
    SyncTrackingCommand,
    InspectionJob,
    RotuladoJob,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSource::Api => "api",
            StatusSource::Recompute => "recompute",
            StatusSource::UpdateEstadosCommand => "update_estados_command",
            StatusSource::SyncTrackingCommand => "sync_tracking_command",
            StatusSource::InspectionJob => "inspection_job",
            StatusSource::RotuladoJob => "rotulado_job",
        }
    }
}
