//! Queue workers
//!
//! Each worker polls the queue, runs one job at a time under the job's
//! timeout and records the outcome. Workers stop claiming new jobs once
//! shutdown is signalled and finish the one in hand. A sweeper task puts
//! back jobs whose worker died, on start and then periodically.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::context::JobContext;
use super::handlers;
use super::queue::{FailOutcome, JobQueue, JobRecord};
use crate::error::AppError;

/// How often the sweeper looks for jobs left running by a dead worker
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run `count` workers until `shutdown` flips to true
pub async fn run_workers(
    queue: JobQueue,
    ctx: Arc<JobContext>,
    count: usize,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    queue.requeue_stale().await?;

    let sweeper = tokio::spawn(sweep_loop(queue.clone(), shutdown.clone()));

    let handles: Vec<JoinHandle<()>> = (0..count.max(1))
        .map(|worker_id| {
            let queue = queue.clone();
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, queue, ctx, poll_interval, shutdown).await;
            })
        })
        .collect();

    tracing::info!(workers = handles.len(), "Job workers started");

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Stale sweeper panicked");
    }

    tracing::info!("Job workers stopped");
    Ok(())
}

async fn sweep_loop(queue: JobQueue, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(STALE_SWEEP_INTERVAL);
    // The first tick fires at once; the startup sweep already ran
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = queue.requeue_stale().await {
                    tracing::error!(error = %e, "Stale job sweep failed");
                }
            }
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: JobQueue,
    ctx: Arc<JobContext>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match queue.claim_next().await {
            Ok(Some(record)) => {
                run_one(worker_id, &queue, &ctx, record).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => tracing::error!(worker_id, error = %e, "Failed to claim job"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::debug!(worker_id, "Worker exiting");
}

async fn run_one(worker_id: usize, queue: &JobQueue, ctx: &JobContext, record: JobRecord) {
    let job = match record.job() {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(worker_id, job_id = %record.id, error = %e, "Undecodable job");
            if let Err(e) = queue.fail(&record, &e.to_string(), false).await {
                tracing::error!(job_id = %record.id, error = %e, "Failed to record job failure");
            }
            return;
        }
    };

    let span = tracing::info_span!(
        "job",
        worker_id,
        job_id = %record.id,
        kind = job.kind(),
        attempt = record.attempts
    );

    // A timed out attempt is always worth retrying
    let timeout = Duration::from_secs(record.timeout_secs.max(1) as u64);
    let result = match tokio::time::timeout(timeout, handlers::handle(ctx, &job))
        .instrument(span)
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            let retryable = err.is_transient();
            Err((err, retryable))
        }
        Err(_) => Err((
            AppError::Internal(format!("timed out after {}s", timeout.as_secs())),
            true,
        )),
    };

    match result {
        Ok(()) => {
            if let Err(e) = queue.complete(record.id).await {
                tracing::error!(job_id = %record.id, error = %e, "Failed to mark job completed");
            } else {
                tracing::info!(job_id = %record.id, kind = job.kind(), "Job completed");
            }
        }
        Err((err, retryable)) => {
            match queue.fail(&record, &err.to_string(), retryable).await {
                Ok(FailOutcome::Retrying { delay_secs }) => {
                    tracing::warn!(
                        job_id = %record.id,
                        kind = job.kind(),
                        attempt = record.attempts,
                        delay_secs,
                        error = %err,
                        "Job failed, will retry"
                    );
                }
                Ok(FailOutcome::Failed) => {
                    handlers::on_failed(&job, record.id, record.attempts, &err);
                }
                Err(e) => {
                    tracing::error!(job_id = %record.id, error = %e, "Failed to record job failure");
                }
            }
        }
    }
}
