//! Business logic services, shared by HTTP handlers, CLI commands and jobs

pub mod cliente;
pub mod cotizacion;
pub mod curso;
pub mod maintenance;
pub mod provider_status;
pub mod tracking;

pub use cliente::ClienteService;
pub use cotizacion::CotizacionService;
pub use curso::CursoService;
pub use maintenance::{MaintenanceService, UuidTable};
pub use provider_status::ProviderStatusService;
pub use tracking::{BatchOptions, TrackingService};
