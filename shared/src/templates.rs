//! Message and document templates
//!
//! Messages are plain Spanish text sent over WhatsApp. Documents use
//! `{{key}}` placeholders filled from a map before rendering to PDF.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Contenedor, Cotizacion, CotizacionProveedor, Payment, PedidoCurso};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Missing template values: {}", .0.join(", "))]
    MissingValues(Vec<String>),

    #[error("Unclosed placeholder at byte {0}")]
    Unclosed(usize),
}

/// Values substituted into a document template
pub type TemplateValues = BTreeMap<String, String>;

/// Substitute every `{{key}}` in `template`.
///
/// Keys are trimmed (`{{ nombre }}` works). All placeholders must have a
/// value; the error lists every missing key once, in order of appearance.
pub fn render_template(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(TemplateError::Unclosed(offset + start))?;
        let key = after[..end].trim();

        match values.get(key) {
            Some(value) => out.push_str(value),
            None => {
                if !missing.iter().any(|k| k == key) {
                    missing.push(key.to_string());
                }
            }
        }

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(TemplateError::MissingValues(missing))
    }
}

fn money(value: Option<Decimal>) -> String {
    format!("${:.2}", value.unwrap_or(Decimal::ZERO))
}

/// Greeting sent when a quotation is confirmed
pub fn welcome_message(cotizacion: &Cotizacion, contenedor: Option<&Contenedor>) -> String {
    let carga = contenedor
        .map(|c| c.carga.as_str())
        .unwrap_or("consolidado");
    let cierre = contenedor
        .and_then(|c| c.f_cierre)
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "por confirmar".to_string());

    format!(
        "Hola {}, bienvenido al {}.\n\n\
         Tu cotización fue registrada con un volumen de {} CBM y un monto de {}.\n\
         Fecha de cierre: {}.\n\n\
         En breve te pediremos los datos de tus proveedores.",
        cotizacion.first_name(),
        carga,
        cotizacion.volumen.unwrap_or(Decimal::ZERO).round_dp(2),
        money(cotizacion.monto),
        cierre,
    )
}

/// Request for the supplier contact data still missing on a line
pub fn data_item_message(cotizacion: &Cotizacion, proveedor: &CotizacionProveedor) -> String {
    let mut missing = Vec::new();
    if proveedor.supplier.as_deref().map(str::trim).unwrap_or("").is_empty() {
        missing.push("nombre del proveedor");
    }
    if proveedor
        .supplier_phone
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        missing.push("teléfono del proveedor");
    }
    if crate::status::parse_arrival_date(proveedor.arrive_date_china.as_deref()).is_none() {
        missing.push("fecha de llegada a almacén");
    }

    let pending = if missing.is_empty() {
        "Por favor confirma que los datos registrados son correctos.".to_string()
    } else {
        format!("Necesitamos: {}.", missing.join(", "))
    };

    format!(
        "Hola {}, sobre tu proveedor {}:\n\n{}",
        cotizacion.first_name(),
        proveedor.display_code(),
        pending,
    )
}

/// Caption for the labelling document
pub fn rotulado_caption(cotizacion: &Cotizacion, codes: &[String]) -> String {
    format!(
        "Hola {}, te enviamos el rotulado de {}. \
         Reenvíalo a tu proveedor para que etiquete cada caja antes de enviarla al almacén.",
        cotizacion.first_name(),
        codes.join(", "),
    )
}

/// Caption for warehouse inspection media
pub fn inspection_caption(proveedor: &CotizacionProveedor, index: usize, total: usize) -> String {
    format!(
        "Inspección de {} ({}/{}). Cajas: {}, CBM: {}",
        proveedor.display_code(),
        index,
        total,
        proveedor.qty_box_china.unwrap_or(0),
        proveedor.cbm_total_china.unwrap_or(Decimal::ZERO).round_dp(2),
    )
}

/// Reminder listing pending payments
pub fn payment_reminder_message(cotizacion: &Cotizacion, payments: &[Payment]) -> String {
    let pending: Vec<&Payment> = payments.iter().filter(|p| p.is_pending()).collect();
    let total: Decimal = pending.iter().map(|p| p.monto).sum();

    let lines: Vec<String> = pending
        .iter()
        .map(|p| format!("- {}: {}", p.concepto, money(Some(p.monto))))
        .collect();

    format!(
        "Hola {}, tienes pagos pendientes:\n{}\nTotal: {}",
        cotizacion.first_name(),
        lines.join("\n"),
        money(Some(total)),
    )
}

/// Credentials message after Moodle enrolment
pub fn course_credentials_message(pedido: &PedidoCurso, moodle_url: &str) -> String {
    format!(
        "Hola {}, ya tienes acceso a tu curso.\n\nIngresa a {}\nUsuario: {}\nContraseña: {}",
        pedido.nombre.split_whitespace().next().unwrap_or(""),
        moodle_url,
        pedido.moodle_username.as_deref().unwrap_or(""),
        pedido.moodle_password.as_deref().unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_all() {
        let out = render_template(
            "Cliente: {{nombre}} / {{ carga }}",
            &values(&[("nombre", "Ana"), ("carga", "#12")]),
        )
        .unwrap();
        assert_eq!(out, "Cliente: Ana / #12");
    }

    #[test]
    fn test_render_reports_missing_once() {
        let err = render_template("{{a}} {{b}} {{a}}", &values(&[])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingValues(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_render_unclosed() {
        let err = render_template("ok {{nombre", &values(&[("nombre", "x")])).unwrap_err();
        assert_eq!(err, TemplateError::Unclosed(3));
    }

    #[test]
    fn test_render_without_placeholders() {
        assert_eq!(render_template("plain", &values(&[])).unwrap(), "plain");
    }
}
