//! Document generation: contracts, labelling sheets and course certificates
//!
//! Templates are plain text with `{{key}}` placeholders. A file in the
//! configured templates directory overrides the built-in copy.

pub mod archive;
pub mod pdf;

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::config::DocumentsConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Contenedor, Cotizacion, CotizacionProveedor, PedidoCurso};
use shared::templates::{render_template, TemplateValues};
use shared::validation::{classify_documento, DocumentKind as IdDocument};

pub use archive::{bundle_zip, sanitize_file_name, Scratch};

/// Document kinds with a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Contrato,
    Rotulado,
    Constancia,
}

impl DocumentKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentKind::Contrato => "contrato.txt",
            DocumentKind::Rotulado => "rotulado.txt",
            DocumentKind::Constancia => "constancia.txt",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Contrato => "Contrato de servicio",
            DocumentKind::Rotulado => "Rotulado",
            DocumentKind::Constancia => "Constancia",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            DocumentKind::Contrato => include_str!("../../../templates/contrato.txt"),
            DocumentKind::Rotulado => include_str!("../../../templates/rotulado.txt"),
            DocumentKind::Constancia => include_str!("../../../templates/constancia.txt"),
        }
    }
}

fn values(pairs: &[(&str, String)]) -> TemplateValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn or_dash(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn tipo_documento(documento: Option<&str>) -> &'static str {
    match documento.map(classify_documento) {
        Some(IdDocument::Dni) => "DNI",
        Some(IdDocument::Ruc) => "RUC",
        _ => "documento",
    }
}

/// Placeholder values for a service contract
pub fn contrato_values(
    cotizacion: &Cotizacion,
    contenedor: Option<&Contenedor>,
    today: NaiveDate,
) -> TemplateValues {
    values(&[
        ("fecha", format_date(today)),
        ("nombre", cotizacion.nombre.trim().to_string()),
        ("tipo_documento", tipo_documento(cotizacion.documento.as_deref()).to_string()),
        ("documento", or_dash(cotizacion.documento.as_deref())),
        ("correo", or_dash(cotizacion.correo.as_deref())),
        ("telefono", or_dash(cotizacion.telefono.as_deref())),
        (
            "empresa",
            or_dash(contenedor.and_then(|c| c.empresa.as_deref())),
        ),
        (
            "carga",
            contenedor
                .map(|c| c.carga.clone())
                .unwrap_or_else(|| "consolidado".to_string()),
        ),
        (
            "cierre",
            contenedor
                .and_then(|c| c.f_cierre)
                .map(format_date)
                .unwrap_or_else(|| "por confirmar".to_string()),
        ),
        (
            "volumen",
            cotizacion.volumen.unwrap_or(Decimal::ZERO).round_dp(2).to_string(),
        ),
        (
            "monto",
            format!("${:.2}", cotizacion.monto.unwrap_or(Decimal::ZERO)),
        ),
    ])
}

/// Placeholder values for one supplier's labelling sheet
pub fn rotulado_values(
    cotizacion: &Cotizacion,
    proveedor: &CotizacionProveedor,
    contenedor: Option<&Contenedor>,
    today: NaiveDate,
) -> TemplateValues {
    values(&[
        ("fecha", format_date(today)),
        ("cliente", cotizacion.nombre.trim().to_string()),
        ("codigo", proveedor.display_code()),
        ("proveedor", or_dash(proveedor.supplier.as_deref())),
        ("productos", or_dash(proveedor.products.as_deref())),
        (
            "cajas",
            proveedor
                .qty_box
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        (
            "carga",
            contenedor
                .map(|c| c.carga.clone())
                .unwrap_or_else(|| "consolidado".to_string()),
        ),
    ])
}

/// Placeholder values for a course certificate
pub fn constancia_values(pedido: &PedidoCurso, curso: &str, today: NaiveDate) -> TemplateValues {
    values(&[
        ("fecha", format_date(today)),
        ("nombre", pedido.full_name()),
        ("documento", or_dash(pedido.documento.as_deref())),
        ("curso", curso.trim().to_string()),
    ])
}

/// Renders documents from templates
#[derive(Clone)]
pub struct DocumentService {
    templates_dir: PathBuf,
    scratch_dir: String,
}

impl DocumentService {
    pub fn new(config: &DocumentsConfig) -> Self {
        Self {
            templates_dir: PathBuf::from(&config.templates_dir),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Template text, from disk when present
    pub fn template(&self, kind: DocumentKind) -> AppResult<String> {
        let path = self.templates_dir.join(kind.file_name());
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(kind.builtin().to_string()),
            Err(e) => Err(AppError::Document(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn render(&self, kind: DocumentKind, values: &TemplateValues) -> AppResult<Vec<u8>> {
        let text = render_template(&self.template(kind)?, values)?;
        pdf::render_text_pdf(kind.title(), &text)
    }

    pub fn scratch(&self) -> AppResult<Scratch> {
        Scratch::new(&self.scratch_dir)
    }

    pub fn contrato_pdf(
        &self,
        cotizacion: &Cotizacion,
        contenedor: Option<&Contenedor>,
    ) -> AppResult<Vec<u8>> {
        let today = Utc::now().date_naive();
        self.render(
            DocumentKind::Contrato,
            &contrato_values(cotizacion, contenedor, today),
        )
    }

    pub fn rotulado_pdf(
        &self,
        cotizacion: &Cotizacion,
        proveedor: &CotizacionProveedor,
        contenedor: Option<&Contenedor>,
    ) -> AppResult<Vec<u8>> {
        let today = Utc::now().date_naive();
        self.render(
            DocumentKind::Rotulado,
            &rotulado_values(cotizacion, proveedor, contenedor, today),
        )
    }

    /// One labelling PDF per supplier, bundled through a scratch directory
    pub fn rotulado_zip(
        &self,
        cotizacion: &Cotizacion,
        proveedores: &[CotizacionProveedor],
        contenedor: Option<&Contenedor>,
    ) -> AppResult<(String, Vec<u8>)> {
        if proveedores.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Cotizacion {} has no suppliers to label",
                cotizacion.id
            )));
        }

        let scratch = self.scratch()?;
        let mut paths = Vec::with_capacity(proveedores.len());
        for proveedor in proveedores {
            let pdf = self.rotulado_pdf(cotizacion, proveedor, contenedor)?;
            // Codes repeat across suppliers; the id keeps each file apart
            let name = format!("rotulado-{}-{}.pdf", proveedor.display_code(), proveedor.id);
            paths.push(scratch.write(&name, &pdf)?);
        }

        let archive_name = sanitize_file_name(&format!(
            "rotulado-{}.zip",
            cotizacion.first_name().to_lowercase()
        ));
        let bytes = scratch.zip_files(&paths, &archive_name)?;
        Ok((archive_name, bytes))
    }

    pub fn constancia_pdf(&self, pedido: &PedidoCurso, curso: &str) -> AppResult<Vec<u8>> {
        let today = Utc::now().date_naive();
        self.render(
            DocumentKind::Constancia,
            &constancia_values(pedido, curso, today),
        )
    }
}
