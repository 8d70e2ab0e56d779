//! Client deduplication key tests

use proptest::prelude::*;
use shared::validation::{classify_documento, normalize_documento, normalize_email, DocumentKind};
use shared::ClienteCandidate;

fn candidate(documento: &str, correo: &str, telefono: &str) -> ClienteCandidate {
    ClienteCandidate {
        nombre: "Ana Quispe".to_string(),
        documento: Some(documento.to_string()),
        correo: Some(correo.to_string()),
        telefono: Some(telefono.to_string()),
    }
}

proptest! {
    /// Two spellings of the same contact produce the same keys
    #[test]
    fn same_contact_same_keys(
        local in "9[0-9]{7}[1-9]",
        dni in "[0-9]{8}",
        user in "[a-z]{3,10}",
    ) {
        let plain = candidate(&dni, &format!("{}@mail.pe", user), &local);
        let messy = candidate(
            &format!(" {}-{} ", &dni[..4], &dni[4..]),
            &format!("  {}@MAIL.PE ", user.to_uppercase()),
            &format!("+51 {} {} {}", &local[..3], &local[3..6], &local[6..]),
        );

        let a = plain.normalized("51");
        let b = messy.normalized("51");
        prop_assert_eq!(a.documento, b.documento);
        prop_assert_eq!(a.correo, b.correo);
        prop_assert_eq!(a.telefono_normalizado, b.telefono_normalizado);
    }

    /// Normalised documents are uppercase alphanumerics
    #[test]
    fn documento_shape(raw in "[a-zA-Z0-9 .-]{0,16}") {
        if let Some(doc) = normalize_documento(&raw) {
            prop_assert!(!doc.is_empty());
            prop_assert!(doc.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    /// Normalised emails are trimmed and lowercase
    #[test]
    fn email_shape(user in "[A-Za-z]{1,8}", domain in "[A-Za-z]{2,8}") {
        let email = normalize_email(&format!(" {}@{}.com ", user, domain)).unwrap();
        prop_assert_eq!(email, format!("{}@{}.com", user.to_lowercase(), domain.to_lowercase()));
    }
}

#[test]
fn dni_and_ruc_classified() {
    assert_eq!(classify_documento("45678912"), DocumentKind::Dni);
    assert_eq!(classify_documento("20123456789"), DocumentKind::Ruc);
    assert_eq!(classify_documento("CE001234"), DocumentKind::Other);
}

#[test]
fn contact_without_keys_detected() {
    let n = ClienteCandidate {
        nombre: "Sin datos".to_string(),
        ..Default::default()
    }
    .normalized("51");
    assert!(!n.has_keys());
}
