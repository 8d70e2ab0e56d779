//! Job payload encoding and retry policy tests

use proptest::prelude::*;
use shared::jobs::{retry_delay_secs, Job, RETRY_BACKOFF_SECS};

fn any_job() -> impl Strategy<Value = Job> {
    let id = 1i64..1_000_000;
    prop_oneof![
        id.clone().prop_map(|cotizacion_id| Job::SendWelcome { cotizacion_id }),
        id.clone().prop_map(|proveedor_id| Job::SendDataItem { proveedor_id }),
        (id.clone(), id.clone()).prop_map(|(cotizacion_id, proveedor_id)| Job::SendRotulado {
            cotizacion_id,
            proveedor_id
        }),
        (id.clone(), proptest::collection::vec(id.clone(), 0..5)).prop_map(
            |(cotizacion_id, proveedor_ids)| Job::ForceSendRotulado {
                cotizacion_id,
                proveedor_ids
            }
        ),
        id.clone().prop_map(|proveedor_id| Job::SendInspectionMedia { proveedor_id }),
        id.clone().prop_map(|cotizacion_id| Job::SendContract { cotizacion_id }),
        id.clone().prop_map(|cotizacion_id| Job::SendPaymentReminder { cotizacion_id }),
        id.clone().prop_map(|pedido_curso_id| Job::EnrollCourseStudent { pedido_curso_id }),
        id.prop_map(|contenedor_id| Job::SyncContenedorSheet { contenedor_id }),
    ]
}

proptest! {
    /// Payloads survive the queue's JSON column and carry their kind tag
    #[test]
    fn payload_survives_json_column(job in any_job()) {
        let value = serde_json::to_value(&job).unwrap();
        prop_assert_eq!(value["kind"].as_str(), Some(job.kind()));

        let back: Job = serde_json::from_value(value).unwrap();
        prop_assert_eq!(back, job);
    }

    /// Back-off grows linearly with the attempts made
    #[test]
    fn retry_delay_is_linear(attempts in 1i32..50) {
        prop_assert_eq!(retry_delay_secs(attempts), i64::from(attempts) * RETRY_BACKOFF_SECS);
        prop_assert!(retry_delay_secs(attempts + 1) > retry_delay_secs(attempts));
    }
}

#[test]
fn first_retry_waits_one_step() {
    assert_eq!(retry_delay_secs(0), RETRY_BACKOFF_SECS);
    assert_eq!(retry_delay_secs(1), 30);
    assert_eq!(retry_delay_secs(3), 90);
}

#[test]
fn inspection_media_declares_its_own_policy() {
    let policy = Job::SendInspectionMedia { proveedor_id: 9 }.retry_policy();
    assert_eq!(policy.max_attempts, Some(3));
    assert_eq!(policy.timeout_secs, Some(300));
}

#[test]
fn other_jobs_use_queue_defaults() {
    let policy = Job::SendWelcome { cotizacion_id: 1 }.retry_policy();
    assert_eq!(policy.max_attempts, None);
    assert_eq!(policy.timeout_secs, None);
}

#[test]
fn unknown_kind_rejected() {
    let err = serde_json::from_str::<Job>(r#"{"kind":"send_fax","cotizacion_id":1}"#);
    assert!(err.is_err());
}

#[test]
fn missing_field_rejected() {
    let err = serde_json::from_str::<Job>(r#"{"kind":"send_rotulado","cotizacion_id":1}"#);
    assert!(err.is_err());
}

#[test]
fn subject_names_the_entity() {
    assert_eq!(
        Job::SendRotulado {
            cotizacion_id: 70,
            proveedor_id: 7
        }
        .subject(),
        "proveedor:7"
    );
    assert_eq!(
        Job::EnrollCourseStudent { pedido_curso_id: 4 }.subject(),
        "pedido_curso:4"
    );
}
