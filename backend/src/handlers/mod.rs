//! HTTP request handlers

pub mod cotizacion;
pub mod curso;
pub mod health;
pub mod jobs;
pub mod proveedor;

pub use cotizacion::{contrato_pdf, enqueue_rotulado, rotulado_zip};
pub use curso::constancia_pdf;
pub use health::health_check;
pub use jobs::{enqueue_job, get_job};
pub use proveedor::{enqueue_inspection, get_status, recompute, tracking_history, transition};
