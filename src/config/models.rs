use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Paths for the embedded stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            queue_path: default_queue_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

/// Upstream log-pull API limits and endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum pull window per request (provider limit: 1 hour).
    #[serde(default = "default_max_window_secs")]
    pub max_window_secs: u64,
    /// Minimum availability delay before a window can be fetched.
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    /// How long the provider retains logs; caps backfill of missed pulls.
    #[serde(default = "default_retained_days")]
    pub retained_days: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_window_secs: default_max_window_secs(),
            min_delay_secs: default_min_delay_secs(),
            retained_days: default_retained_days(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_window_secs() -> u64 {
    3600
}

fn default_min_delay_secs() -> u64 {
    60
}

fn default_retained_days() -> u32 {
    7
}

/// Storage provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Memory,
    Local,
    S3,
}

/// One storage provider entry; listed in failover order, primary first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Label recorded on jobs archived through this provider.
    pub name: String,
    pub kind: ProviderKind,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Root directory for `local` providers.
    pub root: Option<PathBuf>,
    /// S3 credentials (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    /// Days past the window end before the compliance lock allows removal.
    #[serde(default = "default_retention_grace_days")]
    pub retention_grace_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            retention_grace_days: default_retention_grace_days(),
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "memory".to_string(),
        kind: ProviderKind::Memory,
        bucket: None,
        endpoint: None,
        region: None,
        root: None,
        access_key: None,
        secret_key: None,
    }]
}

fn default_retention_grace_days() -> u32 {
    7
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_tick_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_pull_workers")]
    pub pull_workers: usize,
    #[serde(default = "default_maintenance_workers")]
    pub maintenance_workers: usize,
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pull_workers: default_pull_workers(),
            maintenance_workers: default_maintenance_workers(),
            channel_size: default_channel_size(),
        }
    }
}

fn default_pull_workers() -> usize {
    4
}

fn default_maintenance_workers() -> usize {
    2
}

fn default_channel_size() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Retention applied to tenants without an explicit setting
    /// (395 days keeps roughly 13 months of archives).
    #[serde(default = "default_retention_days")]
    pub default_retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            default_retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    395
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config {
            service: ServiceConfig::default(),
            upstream: UpstreamConfig::default(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            worker: WorkerConfig::default(),
            retention: RetentionConfig::default(),
        };

        assert_eq!(config.upstream.max_window_secs, 3600);
        assert_eq!(config.upstream.min_delay_secs, 60);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.storage.providers.len(), 1);
        assert_eq!(config.storage.providers[0].kind, ProviderKind::Memory);
        assert_eq!(config.retention.default_retention_days, 395);
    }
}
