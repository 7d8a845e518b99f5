use std::collections::HashSet;

use thiserror::Error;

use super::models::{Config, ProviderKind};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no storage providers configured")]
    NoProviders,

    #[error("duplicate storage provider name: {0}")]
    DuplicateProviderName(String),

    #[error("provider {0}: s3 providers require a bucket")]
    MissingBucket(String),

    #[error("provider {0}: local providers require a root directory")]
    MissingRoot(String),

    #[error("upstream max_window_secs must be greater than zero")]
    InvalidWindow,

    #[error("worker pools must have at least one worker each")]
    NoWorkers,
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.storage.providers.is_empty() {
        return Err(ValidationError::NoProviders);
    }

    let mut seen = HashSet::new();
    for provider in &config.storage.providers {
        if !seen.insert(provider.name.as_str()) {
            return Err(ValidationError::DuplicateProviderName(
                provider.name.clone(),
            ));
        }
        match provider.kind {
            ProviderKind::S3 if provider.bucket.is_none() => {
                return Err(ValidationError::MissingBucket(provider.name.clone()));
            }
            ProviderKind::Local if provider.root.is_none() => {
                return Err(ValidationError::MissingRoot(provider.name.clone()));
            }
            _ => {}
        }
    }

    if config.upstream.max_window_secs == 0 {
        return Err(ValidationError::InvalidWindow);
    }

    if config.worker.pull_workers == 0 || config.worker.maintenance_workers == 0 {
        return Err(ValidationError::NoWorkers);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::ProviderConfig;

    fn base_config() -> Config {
        Config {
            service: Default::default(),
            upstream: Default::default(),
            storage: Default::default(),
            scheduler: Default::default(),
            worker: Default::default(),
            retention: Default::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_s3_provider_requires_bucket() {
        let mut config = base_config();
        config.storage.providers = vec![ProviderConfig {
            name: "primary".to_string(),
            kind: ProviderKind::S3,
            bucket: None,
            endpoint: None,
            region: None,
            root: None,
            access_key: None,
            secret_key: None,
        }];

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingBucket(name)) if name == "primary"
        ));
    }

    #[test]
    fn test_duplicate_provider_names_rejected() {
        let mut config = base_config();
        let provider = config.storage.providers[0].clone();
        config.storage.providers.push(provider);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::DuplicateProviderName(_))
        ));
    }

    #[test]
    fn test_no_providers_rejected() {
        let mut config = base_config();
        config.storage.providers.clear();
        assert!(matches!(validate(&config), Err(ValidationError::NoProviders)));
    }
}
