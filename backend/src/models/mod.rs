//! Database rows for the consolidated cargo tables
//!
//! Re-exports the domain records from the shared crate and adds the typed
//! rows they are built from at the data-access boundary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub use shared::models::*;
use shared::ProviderStatus;

pub const CONTENEDOR_COLUMNS: &str = "id, carga, f_cierre, f_zarpe, empresa, created_at, updated_at";

pub const COTIZACION_COLUMNS: &str = "id, uuid, id_contenedor, nombre, documento, correo, telefono, \
     monto, volumen, estado, estado_cotizador, estado_cliente, estado_cotizacion_final, \
     created_at, updated_at";

pub const PROVEEDOR_COLUMNS: &str = "id, uuid, id_cotizacion, id_contenedor, code_supplier, products, \
     supplier, supplier_phone, qty_box, cbm_total, qty_box_china, cbm_total_china, \
     arrive_date_china, estados, estados_proveedor, send_rotulado_status, version, \
     created_at, updated_at";

pub const TRACKING_COLUMNS: &str = "id, id_proveedor, id_cotizacion, estado, previous_estado, version, \
     source, created_at, updated_at";

pub const PAYMENT_COLUMNS: &str = "id, id_cotizacion, id_proveedor, monto, concepto, status, created_at";

pub const INSPECTION_COLUMNS: &str =
    "id, id_proveedor, id_cotizacion, file_path, file_type, send_status, created_at";

pub const CLIENTE_COLUMNS: &str =
    "id, nombre, documento, correo, telefono, telefono_normalizado, created_at";

pub const PEDIDO_CURSO_COLUMNS: &str = "id, nombre, apellidos, email, telefono, documento, id_curso, \
     moodle_user_id, moodle_username, moodle_password, enrolled, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct ContenedorRow {
    pub id: i64,
    pub carga: String,
    pub f_cierre: Option<NaiveDate>,
    pub f_zarpe: Option<NaiveDate>,
    pub empresa: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContenedorRow> for Contenedor {
    fn from(row: ContenedorRow) -> Self {
        Contenedor {
            id: row.id,
            carga: row.carga,
            f_cierre: row.f_cierre,
            f_zarpe: row.f_zarpe,
            empresa: row.empresa,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CotizacionRow {
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

impl From<CotizacionRow> for Cotizacion {
    fn from(row: CotizacionRow) -> Self {
        Cotizacion {
            id: row.id,
            uuid: row.uuid,
            id_contenedor: row.id_contenedor,
            nombre: row.nombre,
            documento: row.documento,
            correo: row.correo,
            telefono: row.telefono,
            monto: row.monto,
            volumen: row.volumen,
            estado: row.estado,
            estado_cotizador: row.estado_cotizador,
            estado_cliente: row.estado_cliente,
            estado_cotizacion_final: row.estado_cotizacion_final,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProveedorRow {
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
    pub estados: Option<String>,
    pub estados_proveedor: Option<String>,
    pub send_rotulado_status: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProveedorRow> for CotizacionProveedor {
    fn from(row: ProveedorRow) -> Self {
        let estados = row.estados.as_deref().and_then(|raw| {
            let parsed = ProviderStatus::parse(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                tracing::warn!(proveedor_id = row.id, estados = raw, "Unknown provider status");
            }
            parsed
        });

        CotizacionProveedor {
            id: row.id,
            uuid: row.uuid,
            id_cotizacion: row.id_cotizacion,
            id_contenedor: row.id_contenedor,
            code_supplier: row.code_supplier,
            products: row.products,
            supplier: row.supplier,
            supplier_phone: row.supplier_phone,
            qty_box: row.qty_box,
            cbm_total: row.cbm_total,
            qty_box_china: row.qty_box_china,
            cbm_total_china: row.cbm_total_china,
            arrive_date_china: row.arrive_date_china,
            estados,
            estados_proveedor: row.estados_proveedor,
            send_rotulado_status: row.send_rotulado_status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrackingRow {
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

impl From<TrackingRow> for TrackingEntry {
    fn from(row: TrackingRow) -> Self {
        TrackingEntry {
            id: row.id,
            id_proveedor: row.id_proveedor,
            id_cotizacion: row.id_cotizacion,
            estado: row.estado,
            previous_estado: row.previous_estado,
            version: row.version,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub id_cotizacion: i64,
    pub id_proveedor: Option<i64>,
    pub monto: Decimal,
    pub concepto: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            id_cotizacion: row.id_cotizacion,
            id_proveedor: row.id_proveedor,
            monto: row.monto,
            concepto: row.concepto,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct InspectionRow {
    pub id: i64,
    pub id_proveedor: i64,
    pub id_cotizacion: i64,
    pub file_path: String,
    pub file_type: Option<String>,
    pub send_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<InspectionRow> for InspectionMedia {
    fn from(row: InspectionRow) -> Self {
        InspectionMedia {
            id: row.id,
            id_proveedor: row.id_proveedor,
            id_cotizacion: row.id_cotizacion,
            file_path: row.file_path,
            file_type: row.file_type,
            send_status: row.send_status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ClienteRow {
    pub id: i64,
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
    pub telefono_normalizado: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ClienteRow> for Cliente {
    fn from(row: ClienteRow) -> Self {
        Cliente {
            id: row.id,
            nombre: row.nombre,
            documento: row.documento,
            correo: row.correo,
            telefono: row.telefono,
            telefono_normalizado: row.telefono_normalizado,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PedidoCursoRow {
    pub id: i64,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: String,
    pub telefono: Option<String>,
    pub documento: Option<String>,
    pub id_curso: i64,
    pub moodle_user_id: Option<i64>,
    pub moodle_username: Option<String>,
    pub moodle_password: Option<String>,
    pub enrolled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PedidoCursoRow> for PedidoCurso {
    fn from(row: PedidoCursoRow) -> Self {
        PedidoCurso {
            id: row.id,
            nombre: row.nombre,
            apellidos: row.apellidos,
            email: row.email,
            telefono: row.telefono,
            documento: row.documento,
            id_curso: row.id_curso,
            moodle_user_id: row.moodle_user_id,
            moodle_username: row.moodle_username,
            moodle_password: row.moodle_password,
            enrolled: row.enrolled,
            created_at: row.created_at,
        }
    }
}
