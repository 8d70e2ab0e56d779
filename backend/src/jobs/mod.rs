//! Background jobs: queue, workers and the per-job handlers

pub mod context;
pub mod handlers;
pub mod queue;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use context::JobContext;
pub use queue::{JobQueue, JobRecord};
pub use store::{JobStore, PgJobStore};
pub use shared::jobs::Job;
pub use worker::run_workers;
