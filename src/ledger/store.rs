use std::path::Path;

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ArchiveJob, ArchivedObject, JobStatus, Source, Tenant};

use super::error::Result;
use super::keys::{encode_job_key, encode_object_key, encode_source_key, encode_tenant_key};

/// Fjall-backed persistent store for the archival pipeline's records.
#[derive(Clone)]
pub struct LedgerStore {
    keyspace: Keyspace,
    tenants: PartitionHandle,
    sources: PartitionHandle,
    jobs: PartitionHandle,
    objects: PartitionHandle,
}

impl LedgerStore {
    /// Open or create a ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("opening ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let tenants = keyspace.open_partition("tenants", PartitionCreateOptions::default())?;
        let sources = keyspace.open_partition("sources", PartitionCreateOptions::default())?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let objects = keyspace.open_partition("objects", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            tenants,
            sources,
            jobs,
            objects,
        })
    }

    // ── tenants ──────────────────────────────────────────────────────────

    pub fn upsert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let value = serde_json::to_vec(tenant)?;
        self.tenants.insert(encode_tenant_key(tenant.id), value)?;
        debug!(tenant_id = %tenant.id, "tenant upserted");
        Ok(())
    }

    pub fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        match self.tenants.get(encode_tenant_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut out = Vec::new();
        for item in self.tenants.iter() {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    // ── sources ──────────────────────────────────────────────────────────

    pub fn upsert_source(&self, source: &Source) -> Result<()> {
        let value = serde_json::to_vec(source)?;
        self.sources.insert(encode_source_key(source.id), value)?;
        debug!(source_id = %source.id, "source upserted");
        Ok(())
    }

    pub fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        match self.sources.get(encode_source_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Active sources whose last pull is unset or older than their interval.
    pub fn list_due_sources(&self, now: DateTime<Utc>) -> Result<Vec<Source>> {
        let mut out = Vec::new();
        for item in self.sources.iter() {
            let (_, value) = item?;
            let source: Source = serde_json::from_slice(&value)?;
            if source.is_due(now) {
                out.push(source);
            }
        }
        Ok(out)
    }

    /// Stamps a source's `last_pulled_at`; a no-op if the source vanished.
    pub fn mark_source_pulled(&self, id: Uuid, pulled_at: DateTime<Utc>) -> Result<()> {
        if let Some(mut source) = self.get_source(id)? {
            source.last_pulled_at = Some(pulled_at);
            self.upsert_source(&source)?;
        }
        Ok(())
    }

    // ── jobs ─────────────────────────────────────────────────────────────

    pub fn upsert_job(&self, job: &ArchiveJob) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        self.jobs.insert(encode_job_key(job.id), value)?;
        debug!(job_id = %job.id, status = %job.status, "job upserted");
        Ok(())
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<ArchiveJob>> {
        match self.jobs.get(encode_job_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Most recent chained job for a source, by (created_at, id): the
    /// predecessor link when chaining a new archive. Expired jobs keep
    /// their chain hash, so the chain stays continuous after erasure.
    pub fn last_chained_job(&self, source_id: Uuid) -> Result<Option<ArchiveJob>> {
        let mut newest: Option<ArchiveJob> = None;
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: ArchiveJob = serde_json::from_slice(&value)?;
            if job.source_id != source_id
                || !matches!(job.status, JobStatus::Done | JobStatus::Expired)
            {
                continue;
            }
            let is_newer = newest
                .as_ref()
                .is_none_or(|cur| (job.created_at, job.id) > (cur.created_at, cur.id));
            if is_newer {
                newest = Some(job);
            }
        }
        Ok(newest)
    }

    /// `done` jobs of a tenant whose window end has fallen out of retention.
    pub fn list_expired_jobs(
        &self,
        tenant_id: Uuid,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArchiveJob>> {
        let mut out = Vec::new();
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: ArchiveJob = serde_json::from_slice(&value)?;
            if job.tenant_id == tenant_id && job.is_erasable(retention_days, now) {
                out.push(job);
            }
        }
        Ok(out)
    }

    /// All jobs of a source in creation order, for chain re-verification.
    pub fn list_source_jobs(&self, source_id: Uuid) -> Result<Vec<ArchiveJob>> {
        let mut out = Vec::new();
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: ArchiveJob = serde_json::from_slice(&value)?;
            if job.source_id == source_id {
                out.push(job);
            }
        }
        out.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(out)
    }

    // ── objects ──────────────────────────────────────────────────────────

    pub fn insert_object(&self, object: &ArchivedObject) -> Result<()> {
        let value = serde_json::to_vec(object)?;
        self.objects.insert(encode_object_key(object.id), value)?;
        Ok(())
    }

    /// Persist all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
