//! Configuration management for logvault
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LOGVAULT__<section>__<key>`
//!
//! Examples:
//! - `LOGVAULT__SCHEDULER__TICK_SECS=30`
//! - `LOGVAULT__UPSTREAM__BASE_URL=http://localhost:9000`
//! - `LOGVAULT__SERVICE__LEDGER_PATH=/var/lib/logvault/ledger`
//!
//! S3 credentials come only from the environment (`S3_ACCESS_KEY` /
//! `S3_SECRET_KEY`, or the AWS-style names), never from the TOML file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/logvault.toml`.
//! This can be overridden using the `LOGVAULT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, ProviderConfig, ProviderKind, RetentionConfig, SchedulerConfig, ServiceConfig,
    StorageConfig, UpstreamConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[scheduler]
tick_secs = 30

[[storage.providers]]
name = "primary"
kind = "memory"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.scheduler.tick_secs, 30);
        assert_eq!(config.storage.providers.len(), 1);
        assert_eq!(config.storage.providers[0].name, "primary");
    }

    #[test]
    fn test_validation_catches_missing_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[[storage.providers]]
name = "primary"
kind = "s3"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingBucket(_))
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[service]
ledger_path = "data/ledger"
queue_path = "data/queue"

[upstream]
base_url = "https://api.cloudflare.com/client/v4"
request_timeout_secs = 30
max_window_secs = 3600
min_delay_secs = 60
retained_days = 7

[storage]
retention_grace_days = 7

[[storage.providers]]
name = "garage"
kind = "s3"
bucket = "logvault"
endpoint = "http://garage:3900"
region = "garage"

[[storage.providers]]
name = "fallback"
kind = "local"
root = "data/objects"

[scheduler]
tick_secs = 60

[worker]
pull_workers = 8
maintenance_workers = 2
channel_size = 100

[retention]
default_retention_days = 395
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.storage.providers.len(), 2);
        assert_eq!(config.storage.providers[0].kind, ProviderKind::S3);
        assert_eq!(config.storage.providers[1].kind, ProviderKind::Local);
        assert_eq!(config.worker.pull_workers, 8);
        assert_eq!(config.retention.default_retention_days, 395);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from_path(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scheduler.tick_secs, 60);
    }
}
