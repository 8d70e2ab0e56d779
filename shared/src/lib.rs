//! Shared types and rules for the consolidated cargo backend
//!
//! Everything in this crate is pure: domain records, the provider status
//! rule and state machine, phone normalisation, message templates and the
//! planners batch commands use for dry-run reports.

pub mod batch;
pub mod jobs;
pub mod models;
pub mod phone;
pub mod status;
pub mod templates;
pub mod validation;

pub use models::*;
pub use status::*;
