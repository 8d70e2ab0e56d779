//! Phone number normalisation for the WhatsApp gateway
//!
//! The gateway addresses chats as `<countrycode><number>@c.us`. Numbers in
//! the database come in whatever shape the sales team typed them.

/// Default country code (Peru)
pub const DEFAULT_COUNTRY_CODE: &str = "51";

/// Chat suffix used by the gateway
pub const CHAT_SUFFIX: &str = "@c.us";

/// Keep only the digits of a raw phone string
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalise a phone number to its international digits, without suffix.
///
/// - 9 digits (local mobile) → country code prepended
/// - 10 digits with a leading `0` → `0` dropped, country code prepended
/// - anything else is assumed to already carry a country code
///
/// Returns `None` when the input holds no digits.
pub fn normalize_phone_digits(raw: &str, country_code: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() {
        return None;
    }

    let normalized = match digits.len() {
        9 => format!("{}{}", country_code, digits),
        10 if digits.starts_with('0') => format!("{}{}", country_code, &digits[1..]),
        _ => digits,
    };

    Some(normalized)
}

/// Normalise a phone number to a gateway chat id (`51987654321@c.us`)
pub fn to_chat_id(raw: &str, country_code: &str) -> Option<String> {
    normalize_phone_digits(raw, country_code).map(|digits| format!("{}{}", digits, CHAT_SUFFIX))
}

/// Same as [`to_chat_id`] with the Peru country code
pub fn to_peru_chat_id(raw: &str) -> Option<String> {
    to_chat_id(raw, DEFAULT_COUNTRY_CODE)
}
