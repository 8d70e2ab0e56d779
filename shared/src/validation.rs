//! Validation and normalisation utilities
//!
//! Includes Peru-specific identity document classification.

use crate::phone::digits_only;

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Normalise an email for deduplication (trimmed, lowercase)
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if validate_email(&email).is_ok() {
        Some(email)
    } else {
        None
    }
}

/// Normalise an identity document for deduplication (no spaces or dashes,
/// uppercase)
pub fn normalize_documento(documento: &str) -> Option<String> {
    let doc: String = documento
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

// ============================================================================
// Peru-Specific Validations
// ============================================================================

/// Kind of Peruvian identity document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Documento Nacional de Identidad, 8 digits
    Dni,
    /// Registro Único de Contribuyentes, 11 digits
    Ruc,
    /// Carné de extranjería or passport
    Other,
}

/// Classify a Peruvian identity document
pub fn classify_documento(documento: &str) -> DocumentKind {
    let digits = digits_only(documento);
    let all_digits = digits.len() == documento.trim().len();

    match digits.len() {
        8 if all_digits => DocumentKind::Dni,
        11 if all_digits => DocumentKind::Ruc,
        _ => DocumentKind::Other,
    }
}
