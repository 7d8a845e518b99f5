//! Core records persisted in the ledger: tenants, monitored sources,
//! archive jobs, and stored-object rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a single fetch-window attempt.
///
/// `pending -> running -> {done, failed}`; `done -> expired` once the
/// retention sweep has erased the backing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Expired,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant owning sources and archived data.
///
/// The upstream API token is held verbatim; envelope encryption of
/// credentials is handled outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub upstream_account_id: String,
    pub api_token: String,
    pub retention_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A monitored log-producing unit registered with the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Opaque identifier the upstream provider knows this source by.
    pub upstream_zone_id: String,
    pub name: String,
    pub pull_interval_secs: u64,
    pub last_pulled_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Whether the scheduler should dispatch a pull for this source.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.last_pulled_at {
            None => true,
            Some(t) => now - t >= chrono::Duration::seconds(self.pull_interval_secs as i64),
        }
    }
}

/// One fetch-compress-store attempt for a `[period_start, period_end)` window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub id: Uuid,
    pub source_id: Uuid,
    pub tenant_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: JobStatus,
    #[serde(default)]
    pub object_key: String,
    #[serde(default)]
    pub provider: String,
    /// Hex SHA-256 of the compressed payload exactly as stored.
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub chain_hash: String,
    #[serde(default)]
    pub byte_count: u64,
    #[serde(default)]
    pub line_count: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub err_msg: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchiveJob {
    pub fn new(
        source_id: Uuid,
        tenant_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            tenant_id,
            period_start,
            period_end,
            status: JobStatus::Pending,
            object_key: String::new(),
            provider: String::new(),
            sha256: String::new(),
            chain_hash: String::new(),
            byte_count: 0,
            line_count: 0,
            attempts: 0,
            err_msg: String::new(),
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the retention sweep should erase this job's object.
    pub fn is_erasable(&self, retention_days: u32, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Done
            && self.period_end < now - chrono::Duration::days(retention_days as i64)
    }
}

/// Secondary record of a stored artifact, one per `done` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedObject {
    pub id: Uuid,
    pub job_id: Uuid,
    pub object_key: String,
    pub sha256: String,
    pub byte_count: u64,
    pub created_at: DateTime<Utc>,
}
