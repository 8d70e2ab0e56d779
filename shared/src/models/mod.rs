//! Domain models for the consolidated cargo pipeline

mod cliente;
mod contenedor;
mod cotizacion;
mod curso;
mod inspection;
mod payment;
mod proveedor;
mod tracking;

pub use cliente::*;
pub use contenedor::*;
pub use cotizacion::*;
pub use curso::*;
pub use inspection::*;
pub use payment::*;
pub use proveedor::*;
pub use tracking::*;
