//! Quotation models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A client quotation tied to one container.
///
/// The four `estado*` columns are owned by different teams (sales,
/// quoting, client follow-up, accounting) and move independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cotizacion {
    pub id: i64,
    pub uuid: Option<String>,
    pub id_contenedor: Option<i64>,
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
    pub monto: Option<Decimal>,
    pub volumen: Option<Decimal>,
    pub estado: Option<String>,
    pub estado_cotizador: Option<String>,
    pub estado_cliente: Option<String>,
    pub estado_cotizacion_final: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cotizacion {
    /// First name, used to greet the client in messages
    pub fn first_name(&self) -> &str {
        self.nombre.split_whitespace().next().unwrap_or("")
    }
}
