//! Expire handler: the right-to-erasure workflow.
//!
//! Content is destroyed once retention lapses, but the job record survives
//! as an audit-trail entry (status `expired`, metadata intact). Per-job
//! failures are isolated so one stuck object cannot block a tenant's
//! erasure run.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::ledger::LedgerStore;
use crate::models::JobStatus;
use crate::storage::MultiStore;

use super::Result;

pub struct ExpireProcessor {
    ledger: Arc<LedgerStore>,
    storage: Arc<MultiStore>,
}

impl ExpireProcessor {
    pub fn new(ledger: Arc<LedgerStore>, storage: Arc<MultiStore>) -> Self {
        Self { ledger, storage }
    }

    /// Erases every `done` job of the tenant whose window end is older
    /// than `retention_days`. Returns the number of jobs expired.
    pub async fn process(&self, tenant_id: Uuid, retention_days: u32) -> Result<usize> {
        let now = Utc::now();
        let jobs = self
            .ledger
            .list_expired_jobs(tenant_id, retention_days, now)?;

        let mut expired = 0;
        for mut job in jobs {
            if !job.object_key.is_empty() {
                if let Err(e) = self.storage.delete(&job.provider, &job.object_key).await {
                    error!(
                        job_id = %job.id,
                        key = %job.object_key,
                        provider = %job.provider,
                        error = %e,
                        "failed to delete archived object"
                    );
                    continue;
                }
            }

            job.status = JobStatus::Expired;
            job.updated_at = Utc::now();
            if let Err(e) = self.ledger.upsert_job(&job) {
                error!(job_id = %job.id, error = %e, "failed to mark job expired");
                continue;
            }
            expired += 1;
        }

        if expired > 0 {
            info!(tenant_id = %tenant_id, expired, retention_days, "retention sweep erased archives");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArchiveJob;
    use crate::storage::{
        ArchiveStore, ObjectBackend, PutReceipt, Result as StorageResult, StorageError,
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use tempfile::TempDir;

    /// Backend whose deletes always fail.
    struct StuckBackend;

    #[async_trait]
    impl ObjectBackend for StuckBackend {
        async fn put(
            &self,
            _tenant_id: Uuid,
            _source_id: Uuid,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _raw: &[u8],
        ) -> StorageResult<PutReceipt> {
            Err(StorageError::UnknownProvider("stuck".to_string()))
        }

        async fn get(&self, _key: &str) -> StorageResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn get_raw(&self, _key: &str) -> StorageResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::ObjectStore(object_store::Error::Generic {
                store: "stuck",
                source: "delete refused".into(),
            }))
        }

        fn label(&self) -> &str {
            "stuck"
        }
    }

    fn ledger() -> (Arc<LedgerStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LedgerStore::open(tmp.path().join("ledger")).unwrap());
        (store, tmp)
    }

    async fn archive_old_job(
        ledger: &LedgerStore,
        store: &ArchiveStore,
        provider: &str,
        tenant_id: Uuid,
        age_days: i64,
    ) -> ArchiveJob {
        let now = Utc::now();
        let to = now - chrono::Duration::days(age_days);
        let from = to - chrono::Duration::hours(1);
        let source_id = Uuid::new_v4();
        let receipt = store
            .put(tenant_id, source_id, from, to, b"{\"a\":1}\n")
            .await
            .unwrap();

        let mut job = ArchiveJob::new(source_id, tenant_id, from, to, now);
        job.status = JobStatus::Done;
        job.object_key = receipt.key;
        job.provider = provider.to_string();
        job.sha256 = receipt.sha256;
        ledger.upsert_job(&job).unwrap();
        job
    }

    #[tokio::test]
    async fn test_expire_erases_only_out_of_retention_jobs() {
        let (ledger, _tmp) = ledger();
        let store = ArchiveStore::in_memory("memory");
        let tenant_id = Uuid::new_v4();

        let old = archive_old_job(&ledger, &store, "memory", tenant_id, 40).await;
        let recent = archive_old_job(&ledger, &store, "memory", tenant_id, 10).await;

        let multi = Arc::new(MultiStore::new(vec![
            Arc::new(store.clone()) as Arc<dyn ObjectBackend>
        ]));
        let processor = ExpireProcessor::new(ledger.clone(), multi.clone());

        let expired = processor.process(tenant_id, 30).await.unwrap();
        assert_eq!(expired, 1);

        // The old job's object is gone and its record survives as expired.
        let old_job = ledger.get_job(old.id).unwrap().unwrap();
        assert_eq!(old_job.status, JobStatus::Expired);
        assert_eq!(old_job.sha256, old.sha256);
        assert!(multi.get_raw("memory", &old.object_key).await.is_err());

        // The recent job is untouched.
        let recent_job = ledger.get_job(recent.id).unwrap().unwrap();
        assert_eq!(recent_job.status, JobStatus::Done);
        assert!(multi.get_raw("memory", &recent.object_key).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_abort_batch() {
        let (ledger, _tmp) = ledger();
        let store = ArchiveStore::in_memory("memory");
        let tenant_id = Uuid::new_v4();

        // One job points at a backend whose deletes fail, one is healthy.
        let stuck = archive_old_job(&ledger, &store, "stuck", tenant_id, 40).await;
        let healthy = archive_old_job(&ledger, &store, "memory", tenant_id, 40).await;

        let multi = Arc::new(MultiStore::new(vec![
            Arc::new(StuckBackend) as Arc<dyn ObjectBackend>,
            Arc::new(store) as Arc<dyn ObjectBackend>,
        ]));
        let processor = ExpireProcessor::new(ledger.clone(), multi);

        let expired = processor.process(tenant_id, 30).await.unwrap();
        assert_eq!(expired, 1);

        // The stuck job stays done for a later sweep; the healthy one expired.
        assert_eq!(
            ledger.get_job(stuck.id).unwrap().unwrap().status,
            JobStatus::Done
        );
        assert_eq!(
            ledger.get_job(healthy.id).unwrap().unwrap().status,
            JobStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_expire_with_no_candidates() {
        let (ledger, _tmp) = ledger();
        let multi = Arc::new(MultiStore::new(vec![
            Arc::new(ArchiveStore::in_memory("memory")) as Arc<dyn ObjectBackend>,
        ]));
        let processor = ExpireProcessor::new(ledger, multi);

        let expired = processor.process(Uuid::new_v4(), 30).await.unwrap();
        assert_eq!(expired, 0);
    }
}
