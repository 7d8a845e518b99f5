//! Verify handler: re-download an archived object and confirm its digest.
//!
//! This is the detection mechanism for storage-layer corruption or
//! tampering between upload and verification. A mismatch is always
//! surfaced, never downgraded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::chain;
use crate::ledger::LedgerStore;
use crate::storage::MultiStore;

use super::{Result, TaskError};

pub struct VerifyProcessor {
    ledger: Arc<LedgerStore>,
    storage: Arc<MultiStore>,
}

impl VerifyProcessor {
    pub fn new(ledger: Arc<LedgerStore>, storage: Arc<MultiStore>) -> Self {
        Self { ledger, storage }
    }

    pub async fn process(&self, job_id: Uuid) -> Result<()> {
        let mut job = self
            .ledger
            .get_job(job_id)?
            .ok_or(TaskError::JobNotFound(job_id))?;

        if job.object_key.is_empty() || job.sha256.is_empty() {
            return Err(TaskError::IncompleteJob(job_id));
        }

        // Hash the stored representation verbatim; the digest authenticates
        // the compressed bytes, not their inflation.
        let data = self.storage.get_raw(&job.provider, &job.object_key).await?;

        if let Err(e) = chain::verify_digest(&data, &job.sha256) {
            error!(
                job_id = %job_id,
                key = %job.object_key,
                provider = %job.provider,
                error = %e,
                "integrity violation detected on archived object"
            );
            return Err(e.into());
        }

        // Stamp verified_at so operators can audit which jobs were checked.
        job.verified_at = Some(Utc::now());
        job.updated_at = Utc::now();
        if let Err(e) = self.ledger.upsert_job(&job) {
            warn!(job_id = %job_id, error = %e, "mark verified failed");
        }

        debug!(job_id = %job_id, key = %job.object_key, "object digest verified");
        Ok(())
    }
}
