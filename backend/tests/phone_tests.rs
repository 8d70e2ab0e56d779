//! Phone normalisation tests

use proptest::prelude::*;
use shared::phone::{digits_only, normalize_phone_digits, to_chat_id, to_peru_chat_id, CHAT_SUFFIX};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A local 9-digit mobile always gets the country code
    #[test]
    fn local_mobile_gets_country_code(local in "9[0-9]{8}") {
        prop_assert_eq!(
            normalize_phone_digits(&local, "51"),
            Some(format!("51{}", local))
        );
    }

    /// Spaces, dashes, dots, parentheses and a leading plus are ignored
    #[test]
    fn formatting_is_ignored(local in "9[0-9]{8}", sep in "[ .\\-]{0,2}") {
        let formatted = format!(
            "+51 ({}){}{}{}{}",
            &local[..3],
            sep,
            &local[3..6],
            sep,
            &local[6..]
        );
        prop_assert_eq!(to_peru_chat_id(&formatted), to_peru_chat_id(&format!("51{}", local)));
    }

    /// Normalising twice changes nothing
    #[test]
    fn normalisation_is_idempotent(raw in "[0-9 +()-]{0,16}") {
        if let Some(once) = normalize_phone_digits(&raw, "51") {
            prop_assert_eq!(normalize_phone_digits(&once, "51"), Some(once.clone()));
        }
    }

    /// Chat ids are digits followed by the gateway suffix
    #[test]
    fn chat_id_shape(raw in "[0-9]{1,15}") {
        let chat = to_chat_id(&raw, "51").unwrap();
        prop_assert!(chat.ends_with(CHAT_SUFFIX));
        let digits = chat.trim_end_matches(CHAT_SUFFIX);
        prop_assert!(!digits.is_empty());
        prop_assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }
}

#[test]
fn no_digits_is_none() {
    assert_eq!(normalize_phone_digits("", "51"), None);
    assert_eq!(normalize_phone_digits("sin número", "51"), None);
    assert_eq!(to_peru_chat_id("---"), None);
}

#[test]
fn leading_zero_local_number() {
    assert_eq!(
        normalize_phone_digits("098-765-4321", "51").as_deref(),
        Some("51987654321")
    );
}

#[test]
fn other_country_code_respected() {
    assert_eq!(
        to_chat_id("912345678", "56").as_deref(),
        Some("56912345678@c.us")
    );
}

#[test]
fn digits_only_strips_everything_else() {
    assert_eq!(digits_only("+51 (987) 654-321"), "51987654321");
}
