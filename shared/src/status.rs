//! Provider status lifecycle
//!
//! Two pieces live here:
//! - [`determine_new_status`], the pure rule that derives a supplier line's
//!   status from its raw fields (boxes, volume, contact, arrival date)
//! - [`ProviderStatus::can_transition_to`], the state machine every
//!   authoritative status write is checked against

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a supplier line inside a quotation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderStatus {
    /// Waiting for supplier contact data
    #[serde(rename = "WAIT")]
    Wait,
    /// Supplier contacted, no arrival date yet
    #[serde(rename = "NC")]
    Nc,
    /// Supplier contacted with a confirmed arrival date
    #[serde(rename = "C")]
    C,
    /// Goods recorded at the China warehouse
    #[serde(rename = "R")]
    R,
    #[serde(rename = "RESERVADO")]
    Reservado,
    #[serde(rename = "COBRANDO")]
    Cobrando,
    #[serde(rename = "INSPECTION")]
    Inspection,
    #[serde(rename = "ROTULADO")]
    Rotulado,
    #[serde(rename = "LOADED")]
    Loaded,
}

impl ProviderStatus {
    pub const ALL: [ProviderStatus; 9] = [
        ProviderStatus::Wait,
        ProviderStatus::Nc,
        ProviderStatus::C,
        ProviderStatus::R,
        ProviderStatus::Reservado,
        ProviderStatus::Cobrando,
        ProviderStatus::Inspection,
        ProviderStatus::Rotulado,
        ProviderStatus::Loaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Wait => "WAIT",
            ProviderStatus::Nc => "NC",
            ProviderStatus::C => "C",
            ProviderStatus::R => "R",
            ProviderStatus::Reservado => "RESERVADO",
            ProviderStatus::Cobrando => "COBRANDO",
            ProviderStatus::Inspection => "INSPECTION",
            ProviderStatus::Rotulado => "ROTULADO",
            ProviderStatus::Loaded => "LOADED",
        }
    }

    /// Parse a stored status string. Legacy rows carry lowercase values and
    /// stray whitespace, so the comparison is trimmed and case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    /// True while the goods have not reached the warehouse
    pub fn is_pre_arrival(&self) -> bool {
        matches!(
            self,
            ProviderStatus::Wait | ProviderStatus::Nc | ProviderStatus::C
        )
    }

    /// Whether a direct move from `self` to `next` is a legal transition.
    ///
    /// Staying in the same state is always allowed (and is a no-op for
    /// callers). `LOADED` is terminal.
    pub fn can_transition_to(&self, next: ProviderStatus) -> bool {
        use ProviderStatus::*;

        if *self == next {
            return true;
        }

        match (*self, next) {
            (from, to) if from.is_pre_arrival() && to.is_pre_arrival() => true,
            (from, R) if from.is_pre_arrival() => true,
            (R, Reservado) | (R, Cobrando) => true,
            (Reservado, R) | (Cobrando, R) => true,
            (Reservado, Cobrando) | (Cobrando, Reservado) => true,
            (R, Inspection) | (Reservado, Inspection) | (Cobrando, Inspection) => true,
            (Inspection, Rotulado) => true,
            (Rotulado, Loaded) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown provider status: {}", s))
    }
}

/// The subset of a supplier line the status rule reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub qty_box_china: Option<i32>,
    pub cbm_total_china: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_phone: Option<String>,
    pub arrive_date_china: Option<String>,
    pub current: Option<ProviderStatus>,
}

/// Values legacy rows use to mean "no date"
const EMPTY_DATES: [&str; 3] = ["", "0000-00-00", "0000-00-00 00:00:00"];

/// Parse the free-text arrival date column.
///
/// Returns `None` for zero dates and anything unparseable; never errors.
pub fn parse_arrival_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if EMPTY_DATES.contains(&raw) {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Derive the status a supplier line should be in from its raw fields.
///
/// 1. boxes or volume recorded in China → `R`
/// 2. supplier name and phone present → `C` with a valid arrival date,
///    otherwise `NC`
/// 3. anything else → `WAIT`
pub fn determine_new_status(snapshot: &ProviderSnapshot) -> ProviderStatus {
    let has_boxes = snapshot.qty_box_china.map(|q| q > 0).unwrap_or(false);
    let has_volume = snapshot
        .cbm_total_china
        .map(|c| c > Decimal::ZERO)
        .unwrap_or(false);

    if has_boxes || has_volume {
        return ProviderStatus::R;
    }

    if is_present(snapshot.supplier.as_deref()) && is_present(snapshot.supplier_phone.as_deref()) {
        return match parse_arrival_date(snapshot.arrive_date_china.as_deref()) {
            Some(_) => ProviderStatus::C,
            None => ProviderStatus::Nc,
        };
    }

    ProviderStatus::Wait
}
