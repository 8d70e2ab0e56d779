//! Container models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A shipping container / consolidation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contenedor {
    pub id: i64,
    /// Batch label shown to clients ("Contenedor #12")
    pub carga: String,
    pub f_cierre: Option<NaiveDate>,
    pub f_zarpe: Option<NaiveDate>,
    pub empresa: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
