//! Task handlers and the worker pool that runs them.
//!
//! Each handler operates on the single job or tenant named by its task
//! payload and shares no mutable state with concurrent invocations, so the
//! pool can run any number of them in parallel. Retry of failed tasks is
//! the delivery queue's responsibility; handlers never retry internally.

pub mod expire;
pub mod pull;
pub mod verify;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::chain::ChainError;
use crate::ledger::LedgerError;
use crate::observability::Metrics;
use crate::queue::store::FjallQueue;
use crate::queue::{Task, TaskEnvelope};
use crate::storage::StorageError;
use crate::upstream::UpstreamError;

pub use expire::ExpireProcessor;
pub use pull::PullProcessor;
pub use verify::VerifyProcessor;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("source not found: {0}")]
    SourceNotFound(Uuid),

    #[error("tenant not found: {0}")]
    TenantNotFound(Uuid),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("job {0} is missing its object key or digest")]
    IncompleteJob(Uuid),

    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("integrity check failed: {0}")]
    Integrity(#[from] ChainError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl TaskError {
    /// Stable failure code recorded on dead-lettered tasks.
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            TaskError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            TaskError::JobNotFound(_) => "JOB_NOT_FOUND",
            TaskError::IncompleteJob(_) => "INCOMPLETE_JOB",
            TaskError::Upstream(_) => "UPSTREAM_ERROR",
            TaskError::Storage(_) => "STORAGE_ERROR",
            TaskError::Integrity(_) => "DIGEST_MISMATCH",
            TaskError::Ledger(_) => "LEDGER_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// The three task handlers, bundled for dispatch.
pub struct Processors {
    pub pull: PullProcessor,
    pub verify: VerifyProcessor,
    pub expire: ExpireProcessor,
}

impl Processors {
    pub async fn dispatch(&self, task: Task) -> Result<()> {
        match task {
            Task::Pull {
                source_id,
                tenant_id,
                period_start,
                period_end,
            } => {
                self.pull
                    .process(source_id, tenant_id, period_start, period_end)
                    .await?;
                Ok(())
            }
            Task::Verify { job_id } => self.verify.process(job_id).await,
            Task::Expire {
                tenant_id,
                retention_days,
            } => {
                self.expire.process(tenant_id, retention_days).await?;
                Ok(())
            }
        }
    }
}

/// Spawns one task per worker channel across both pools.
pub fn spawn_workers(
    processors: Arc<Processors>,
    queue: Arc<FjallQueue>,
    metrics: Arc<Metrics>,
    pull_receivers: Vec<mpsc::Receiver<TaskEnvelope>>,
    maintenance_receivers: Vec<mpsc::Receiver<TaskEnvelope>>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for (worker_id, rx) in pull_receivers
        .into_iter()
        .chain(maintenance_receivers)
        .enumerate()
    {
        handles.push(tokio::spawn(worker_loop(
            worker_id,
            rx,
            processors.clone(),
            queue.clone(),
            metrics.clone(),
            shutdown.clone(),
        )));
    }
    handles
}

async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<TaskEnvelope>,
    processors: Arc<Processors>,
    queue: Arc<FjallQueue>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(envelope) => {
                    process_envelope(worker_id, envelope, &processors, &queue, &metrics).await;
                }
                None => break,
            },
            _ = shutdown.changed() => {
                // Drain whatever was already dispatched, then exit.
                while let Ok(envelope) = rx.try_recv() {
                    process_envelope(worker_id, envelope, &processors, &queue, &metrics).await;
                }
                break;
            }
        }
    }
    debug!(worker_id, "worker stopped");
}

async fn process_envelope(
    worker_id: usize,
    envelope: TaskEnvelope,
    processors: &Processors,
    queue: &FjallQueue,
    metrics: &Metrics,
) {
    let kind = envelope.task.kind();
    match processors.dispatch(envelope.task).await {
        Ok(()) => metrics.task_completed(),
        Err(err) => {
            metrics.task_failed();
            error!(worker_id, seq = envelope.seq, kind, error = %err, "task failed");
            if let Err(dlq_err) = queue.move_to_dlq(envelope.seq, err.code(), err.to_string(), 1) {
                error!(seq = envelope.seq, error = %dlq_err, "failed to record dead letter");
            }
        }
    }
}
