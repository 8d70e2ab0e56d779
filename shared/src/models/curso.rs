//! Course order models (Moodle enrolment)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student's order for a course hosted on Moodle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedidoCurso {
    pub id: i64,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: String,
    pub telefono: Option<String>,
    pub documento: Option<String>,
    /// Moodle course id
    pub id_curso: i64,
    pub moodle_user_id: Option<i64>,
    pub moodle_username: Option<String>,
    pub moodle_password: Option<String>,
    pub enrolled: bool,
    pub created_at: DateTime<Utc>,
}

impl PedidoCurso {
    /// Moodle username derived from the document number, falling back to
    /// the local part of the email
    pub fn derived_username(&self) -> String {
        let from_doc = self
            .documento
            .as_deref()
            .map(|d| d.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
            .filter(|d| !d.is_empty());

        from_doc
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or("").to_string())
            .to_lowercase()
    }

    pub fn full_name(&self) -> String {
        match self.apellidos.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.nombre.trim(), last),
            _ => self.nombre.trim().to_string(),
        }
    }
}
