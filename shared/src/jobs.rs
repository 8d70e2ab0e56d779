//! Queued job payloads
//!
//! Payloads carry primitive ids only; handlers re-fetch fresh rows when
//! they run. The serialized form is tagged by `kind`, which is also stored
//! in its own column of the queue table.

use serde::{Deserialize, Serialize};

/// Back-off between attempts, in seconds per attempt already made
pub const RETRY_BACKOFF_SECS: i64 = 30;

/// A unit of asynchronous work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    SendWelcome {
        cotizacion_id: i64,
    },
    SendDataItem {
        proveedor_id: i64,
    },
    SendRotulado {
        cotizacion_id: i64,
        proveedor_id: i64,
    },
    /// Labelling sheets for several suppliers at once, sent as a ZIP.
    /// An empty list means every supplier of the quotation.
    ForceSendRotulado {
        cotizacion_id: i64,
        #[serde(default)]
        proveedor_ids: Vec<i64>,
    },
    SendInspectionMedia {
        proveedor_id: i64,
    },
    SendContract {
        cotizacion_id: i64,
    },
    SendPaymentReminder {
        cotizacion_id: i64,
    },
    EnrollCourseStudent {
        pedido_curso_id: i64,
    },
    SyncContenedorSheet {
        contenedor_id: i64,
    },
}

/// Attempts and timeout a job asks for; `None` means the queue default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_attempts: Option<i32>,
    pub timeout_secs: Option<i32>,
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::SendWelcome { .. } => "send_welcome",
            Job::SendDataItem { .. } => "send_data_item",
            Job::SendRotulado { .. } => "send_rotulado",
            Job::ForceSendRotulado { .. } => "force_send_rotulado",
            Job::SendInspectionMedia { .. } => "send_inspection_media",
            Job::SendContract { .. } => "send_contract",
            Job::SendPaymentReminder { .. } => "send_payment_reminder",
            Job::EnrollCourseStudent { .. } => "enroll_course_student",
            Job::SyncContenedorSheet { .. } => "sync_contenedor_sheet",
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            // Media uploads are slow and the gateway throttles them
            Job::SendInspectionMedia { .. } => RetryPolicy {
                max_attempts: Some(3),
                timeout_secs: Some(300),
            },
            _ => RetryPolicy::default(),
        }
    }

    /// Entity the job is about, for logs
    pub fn subject(&self) -> String {
        match self {
            Job::SendWelcome { cotizacion_id }
            | Job::SendContract { cotizacion_id }
            | Job::SendPaymentReminder { cotizacion_id } => format!("cotizacion:{}", cotizacion_id),
            Job::ForceSendRotulado { cotizacion_id, .. } => format!("cotizacion:{}", cotizacion_id),
            Job::SendRotulado { proveedor_id, .. }
            | Job::SendDataItem { proveedor_id }
            | Job::SendInspectionMedia { proveedor_id } => format!("proveedor:{}", proveedor_id),
            Job::EnrollCourseStudent { pedido_curso_id } => {
                format!("pedido_curso:{}", pedido_curso_id)
            }
            Job::SyncContenedorSheet { contenedor_id } => format!("contenedor:{}", contenedor_id),
        }
    }
}

/// Seconds to wait before the next attempt
pub fn retry_delay_secs(attempts_made: i32) -> i64 {
    i64::from(attempts_made.max(1)) * RETRY_BACKOFF_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_tagged_by_kind() {
        let job = Job::SendRotulado {
            cotizacion_id: 70,
            proveedor_id: 7,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"kind": "send_rotulado", "cotizacion_id": 70, "proveedor_id": 7})
        );
        assert_eq!(value["kind"], job.kind());
    }

    #[test]
    fn test_force_send_defaults_to_all_suppliers() {
        let job: Job =
            serde_json::from_str(r#"{"kind":"force_send_rotulado","cotizacion_id":5}"#).unwrap();
        assert_eq!(
            job,
            Job::ForceSendRotulado {
                cotizacion_id: 5,
                proveedor_ids: vec![]
            }
        );
    }

    #[test]
    fn test_inspection_media_policy() {
        let policy = Job::SendInspectionMedia { proveedor_id: 1 }.retry_policy();
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.timeout_secs, Some(300));
        assert_eq!(
            Job::SendWelcome { cotizacion_id: 1 }.retry_policy(),
            RetryPolicy::default()
        );
    }

    #[test]
    fn test_linear_backoff() {
        assert_eq!(retry_delay_secs(0), 30);
        assert_eq!(retry_delay_secs(1), 30);
        assert_eq!(retry_delay_secs(3), 90);
    }
}
