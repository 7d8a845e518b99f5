//! Pull handler: fetch one log window, archive it, and extend the chain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::chain;
use crate::ledger::LedgerStore;
use crate::models::{ArchiveJob, ArchivedObject, JobStatus};
use crate::queue::{Task, TaskQueue};
use crate::storage::MultiStore;
use crate::upstream::LogSource;

use super::{Result, TaskError};

pub struct PullProcessor {
    ledger: Arc<LedgerStore>,
    storage: Arc<MultiStore>,
    upstream: Arc<dyn LogSource>,
    queue: Arc<dyn TaskQueue>,
}

impl PullProcessor {
    pub fn new(
        ledger: Arc<LedgerStore>,
        storage: Arc<MultiStore>,
        upstream: Arc<dyn LogSource>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            ledger,
            storage,
            upstream,
            queue,
        }
    }

    /// Runs one fetch-compress-store-hash attempt for the window.
    ///
    /// Sequencing inside a job is strict: fetch, then store, then chain
    /// link, then the `done` transition. Fetch and upload failures are
    /// recorded on the job and re-raised so the delivery queue governs
    /// reattempts.
    pub async fn process(
        &self,
        source_id: Uuid,
        tenant_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Uuid> {
        // Fail fast before creating a job record.
        let source = self
            .ledger
            .get_source(source_id)?
            .ok_or(TaskError::SourceNotFound(source_id))?;
        let tenant = self
            .ledger
            .get_tenant(tenant_id)?
            .ok_or(TaskError::TenantNotFound(tenant_id))?;

        let mut job = ArchiveJob::new(source_id, tenant_id, period_start, period_end, Utc::now());
        self.ledger.upsert_job(&job)?;

        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        self.ledger.upsert_job(&job)?;
        info!(job_id = %job.id, source_id = %source_id, %period_start, %period_end, "pull started");

        let raw = match self
            .upstream
            .fetch(
                &source.upstream_zone_id,
                &tenant.api_token,
                period_start,
                period_end,
                &[],
            )
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail_job(&mut job, e.into())),
        };

        // An empty window is archived like any other payload, so every
        // done job carries an object, digest, and chain link.
        let (receipt, provider) = match self
            .storage
            .put(tenant_id, source_id, period_start, period_end, &raw)
            .await
        {
            Ok(out) => out,
            Err(e) => return Err(self.fail_job(&mut job, e.into())),
        };

        let prev_hash = self
            .ledger
            .last_chained_job(source_id)?
            .map(|prev| prev.chain_hash)
            .unwrap_or_else(|| chain::GENESIS_HASH.to_string());
        let chain_hash = chain::link_hash(&prev_hash, &receipt.sha256, &job.id.to_string());

        job.status = JobStatus::Done;
        job.object_key = receipt.key.clone();
        job.provider = provider;
        job.sha256 = receipt.sha256.clone();
        job.chain_hash = chain_hash;
        job.byte_count = receipt.byte_count;
        job.line_count = receipt.line_count;
        job.updated_at = Utc::now();
        self.ledger.upsert_job(&job)?;

        self.ledger.insert_object(&ArchivedObject {
            id: Uuid::new_v4(),
            job_id: job.id,
            object_key: receipt.key.clone(),
            sha256: receipt.sha256,
            byte_count: receipt.byte_count,
            created_at: Utc::now(),
        })?;

        // "Did pull" signal; the scheduler only ever decides to pull.
        self.ledger.mark_source_pulled(source_id, period_end)?;

        // Verification is advisory: a failed enqueue defers the integrity
        // check but does not undo a completed pull.
        if let Err(e) = self.queue.enqueue(Task::Verify { job_id: job.id }).await {
            error!(job_id = %job.id, error = %e, "enqueue verify task failed, integrity check deferred");
        }

        info!(
            job_id = %job.id,
            key = %job.object_key,
            provider = %job.provider,
            lines = job.line_count,
            bytes = job.byte_count,
            "pull completed"
        );
        Ok(job.id)
    }

    fn fail_job(&self, job: &mut ArchiveJob, err: TaskError) -> TaskError {
        job.attempts += 1;
        job.status = JobStatus::Failed;
        job.err_msg = err.to_string();
        job.updated_at = Utc::now();
        if let Err(persist_err) = self.ledger.upsert_job(job) {
            error!(job_id = %job.id, error = %persist_err, "failed to persist job failure");
        }
        err
    }
}
