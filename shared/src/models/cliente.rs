//! Deduplicated client contacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::phone::normalize_phone_digits;
use crate::validation::{normalize_documento, normalize_email};

/// A client contact, unique by normalised phone, document and email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cliente {
    pub id: i64,
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
    pub telefono_normalizado: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Contact data harvested from a quotation or course order
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ClienteCandidate {
    #[validate(length(min = 1))]
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
}

/// Candidate with its deduplication keys normalised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCliente {
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
    pub telefono_normalizado: Option<String>,
}

impl NormalizedCliente {
    /// Whether any key can identify the contact
    pub fn has_keys(&self) -> bool {
        self.documento.is_some() || self.correo.is_some() || self.telefono_normalizado.is_some()
    }
}

impl ClienteCandidate {
    /// Normalise phone, document and email; unusable values become `None`
    pub fn normalized(&self, country_code: &str) -> NormalizedCliente {
        let telefono = self
            .telefono
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        NormalizedCliente {
            nombre: self.nombre.trim().to_string(),
            documento: self.documento.as_deref().and_then(normalize_documento),
            correo: self.correo.as_deref().and_then(normalize_email),
            telefono_normalizado: telefono
                .as_deref()
                .and_then(|t| normalize_phone_digits(t, country_code)),
            telefono,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_keys() {
        let candidate = ClienteCandidate {
            nombre: "  Ana Quispe ".to_string(),
            documento: Some("4567-8912".to_string()),
            correo: Some(" Ana@Example.COM ".to_string()),
            telefono: Some("987 654 321".to_string()),
        };
        let n = candidate.normalized("51");

        assert_eq!(n.nombre, "Ana Quispe");
        assert_eq!(n.documento.as_deref(), Some("45678912"));
        assert_eq!(n.correo.as_deref(), Some("ana@example.com"));
        assert_eq!(n.telefono_normalizado.as_deref(), Some("51987654321"));
        assert!(n.has_keys());
    }

    #[test]
    fn test_unusable_values_dropped() {
        let candidate = ClienteCandidate {
            nombre: "Sin datos".to_string(),
            documento: Some(" - ".to_string()),
            correo: Some("no-email".to_string()),
            telefono: Some("   ".to_string()),
        };
        let n = candidate.normalized("51");
        assert!(!n.has_keys());
        assert_eq!(n.telefono, None);
    }
}
