//! Supplier status rule and state machine tests

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{determine_new_status, ProviderSnapshot, ProviderStatus};

fn any_status() -> impl Strategy<Value = ProviderStatus> {
    (0..ProviderStatus::ALL.len()).prop_map(|i| ProviderStatus::ALL[i])
}

fn blank_or_none() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        Just(Some("   ".to_string())),
    ]
}

fn valid_date() -> impl Strategy<Value = String> {
    (2020i32..2030, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| format!("{:04}-{:02}-{:02}", y, m, d))
}

/// Pipeline stage; legal moves never go to a lower stage
fn stage(status: ProviderStatus) -> u8 {
    match status {
        ProviderStatus::Wait | ProviderStatus::Nc | ProviderStatus::C => 0,
        ProviderStatus::R | ProviderStatus::Reservado | ProviderStatus::Cobrando => 1,
        ProviderStatus::Inspection => 2,
        ProviderStatus::Rotulado => 3,
        ProviderStatus::Loaded => 4,
    }
}

// =============================================================================
// determine_new_status
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Boxes recorded in China always mean R, whatever else is filled in
    #[test]
    fn boxes_recorded_is_always_r(
        boxes in 1i32..10_000,
        cents in -1000i64..100_000,
        supplier in proptest::option::of("[A-Za-z ]{0,12}"),
        phone in proptest::option::of("[0-9 ]{0,12}"),
        arrive in proptest::option::of("[0-9/-]{0,12}"),
        current in proptest::option::of(any_status()),
    ) {
        let snapshot = ProviderSnapshot {
            qty_box_china: Some(boxes),
            cbm_total_china: Some(Decimal::new(cents, 2)),
            supplier,
            supplier_phone: phone,
            arrive_date_china: arrive,
            current,
        };
        prop_assert_eq!(determine_new_status(&snapshot), ProviderStatus::R);
    }

    /// Positive volume alone is enough for R
    #[test]
    fn volume_recorded_is_r(cents in 1i64..1_000_000) {
        let snapshot = ProviderSnapshot {
            qty_box_china: Some(0),
            cbm_total_china: Some(Decimal::new(cents, 2)),
            ..Default::default()
        };
        prop_assert_eq!(determine_new_status(&snapshot), ProviderStatus::R);
    }

    /// Without boxes or volume, a missing supplier name means WAIT
    #[test]
    fn missing_supplier_is_wait(
        supplier in blank_or_none(),
        phone in proptest::option::of("[0-9]{9}"),
        arrive in proptest::option::of(valid_date()),
    ) {
        let snapshot = ProviderSnapshot {
            qty_box_china: Some(0),
            cbm_total_china: Some(Decimal::ZERO),
            supplier,
            supplier_phone: phone,
            arrive_date_china: arrive,
            current: None,
        };
        prop_assert_eq!(determine_new_status(&snapshot), ProviderStatus::Wait);
    }

    /// Contact data with a real arrival date means C
    #[test]
    fn contact_with_date_is_c(
        supplier in "[A-Za-z][A-Za-z ]{0,15}",
        phone in "[0-9]{6,12}",
        arrive in valid_date(),
    ) {
        let snapshot = ProviderSnapshot {
            supplier: Some(supplier),
            supplier_phone: Some(phone),
            arrive_date_china: Some(arrive),
            ..Default::default()
        };
        prop_assert_eq!(determine_new_status(&snapshot), ProviderStatus::C);
    }

    /// Contact data with no usable date means NC
    #[test]
    fn contact_without_date_is_nc(
        supplier in "[A-Za-z][A-Za-z ]{0,15}",
        phone in "[0-9]{6,12}",
        arrive in prop_oneof![
            Just(None),
            Just(Some("0000-00-00".to_string())),
            Just(Some("0000-00-00 00:00:00".to_string())),
            "[a-z]{1,10}".prop_map(Some),
        ],
    ) {
        let snapshot = ProviderSnapshot {
            supplier: Some(supplier),
            supplier_phone: Some(phone),
            arrive_date_china: arrive,
            ..Default::default()
        };
        prop_assert_eq!(determine_new_status(&snapshot), ProviderStatus::Nc);
    }

    /// The rule reads the raw fields only, never the current status
    #[test]
    fn rule_ignores_current_status(
        boxes in proptest::option::of(-5i32..5),
        supplier in proptest::option::of("[A-Z]{0,4}"),
        phone in proptest::option::of("[0-9]{0,4}"),
        a in any_status(),
        b in any_status(),
    ) {
        let base = ProviderSnapshot {
            qty_box_china: boxes,
            supplier,
            supplier_phone: phone,
            ..Default::default()
        };
        let with_a = ProviderSnapshot { current: Some(a), ..base.clone() };
        let with_b = ProviderSnapshot { current: Some(b), ..base };
        prop_assert_eq!(determine_new_status(&with_a), determine_new_status(&with_b));
    }
}

// =============================================================================
// State machine
// =============================================================================

proptest! {
    /// No legal move goes back to an earlier stage
    #[test]
    fn transitions_never_go_backwards(from in any_status(), to in any_status()) {
        if from.can_transition_to(to) {
            prop_assert!(stage(to) >= stage(from), "{} -> {} goes backwards", from, to);
        }
    }

    /// Staying put is always allowed
    #[test]
    fn self_transition_allowed(status in any_status()) {
        prop_assert!(status.can_transition_to(status));
    }

    /// Parsing the wire string gives back the same status, in any case
    #[test]
    fn wire_string_round_trips(status in any_status(), lower in any::<bool>()) {
        let raw = if lower { status.as_str().to_lowercase() } else { status.as_str().to_string() };
        prop_assert_eq!(ProviderStatus::parse(&format!(" {} ", raw)), Some(status));
    }
}

mod state_machine {
    use super::*;

    #[test]
    fn pre_arrival_can_reach_r() {
        for from in [ProviderStatus::Wait, ProviderStatus::Nc, ProviderStatus::C] {
            assert!(from.can_transition_to(ProviderStatus::R), "{} -> R", from);
        }
    }

    #[test]
    fn coordination_states_move_freely() {
        use ProviderStatus::*;
        for (from, to) in [(R, Reservado), (Reservado, Cobrando), (Cobrando, Reservado), (Cobrando, R)] {
            assert!(from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn rotulado_requires_inspection() {
        use ProviderStatus::*;
        for from in [Wait, Nc, C, R, Reservado, Cobrando] {
            assert!(!from.can_transition_to(Rotulado), "{} -> ROTULADO", from);
        }
        assert!(Inspection.can_transition_to(Rotulado));
    }

    #[test]
    fn loaded_only_after_rotulado() {
        for from in ProviderStatus::ALL {
            let allowed = from.can_transition_to(ProviderStatus::Loaded);
            let expected = matches!(from, ProviderStatus::Rotulado | ProviderStatus::Loaded);
            assert_eq!(allowed, expected, "{} -> LOADED", from);
        }
    }
}
