//! Warehouse inspection media

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MEDIA_PENDING: &str = "PENDING";
pub const MEDIA_SENDED: &str = "SENDED";

/// A photo or video taken during warehouse inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionMedia {
    pub id: i64,
    pub id_proveedor: i64,
    pub id_cotizacion: i64,
    pub file_path: String,
    pub file_type: Option<String>,
    pub send_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InspectionMedia {
    pub fn is_pending(&self) -> bool {
        self.send_status.as_deref() != Some(MEDIA_SENDED)
    }

    /// File name for the gateway payload
    pub fn file_name(&self) -> String {
        std::path::Path::new(&self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("inspection-{}", self.id))
    }
}
