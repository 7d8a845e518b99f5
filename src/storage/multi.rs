//! Ordered failover across storage providers.
//!
//! Uploads try each configured provider in turn and return on the first
//! success, recording the winning provider's label on the job. Reads and
//! deletes address the provider that actually holds the object; the core
//! never searches all providers for a key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::{ObjectBackend, PutReceipt, Result, StorageError};

pub struct MultiStore {
    providers: Vec<Arc<dyn ObjectBackend>>,
}

impl MultiStore {
    /// Providers are tried in the order given, primary first.
    pub fn new(providers: Vec<Arc<dyn ObjectBackend>>) -> Self {
        Self { providers }
    }

    /// Uploads to the first available provider, returning the receipt and
    /// the winning provider's label.
    pub async fn put(
        &self,
        tenant_id: Uuid,
        source_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        raw: &[u8],
    ) -> Result<(PutReceipt, String)> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.put(tenant_id, source_id, from, to, raw).await {
                Ok(receipt) => return Ok((receipt, provider.label().to_string())),
                Err(e) => {
                    warn!(provider = provider.label(), error = %e, "upload failed, trying next provider");
                    last_err = Some(e);
                }
            }
        }

        let last = last_err
            .unwrap_or_else(|| StorageError::UnknownProvider("no providers configured".to_string()));
        Err(StorageError::AllProvidersFailed(Box::new(last)))
    }

    pub async fn get(&self, provider: &str, key: &str) -> Result<Vec<u8>> {
        self.provider(provider)?.get(key).await
    }

    pub async fn get_raw(&self, provider: &str, key: &str) -> Result<Vec<u8>> {
        self.provider(provider)?.get_raw(key).await
    }

    pub async fn delete(&self, provider: &str, key: &str) -> Result<()> {
        self.provider(provider)?.delete(key).await
    }

    fn provider(&self, label: &str) -> Result<&Arc<dyn ObjectBackend>> {
        self.providers
            .iter()
            .find(|p| p.label() == label)
            .ok_or_else(|| StorageError::UnknownProvider(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArchiveStore;
    use async_trait::async_trait;

    /// Backend whose every operation fails, simulating a provider outage.
    struct DownBackend {
        label: String,
    }

    #[async_trait]
    impl ObjectBackend for DownBackend {
        async fn put(
            &self,
            _tenant_id: Uuid,
            _source_id: Uuid,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _raw: &[u8],
        ) -> Result<PutReceipt> {
            Err(StorageError::ObjectStore(object_store::Error::Generic {
                store: "down",
                source: "provider unavailable".into(),
            }))
        }

        async fn get(&self, _key: &str) -> Result<Vec<u8>> {
            Err(StorageError::UnknownProvider(self.label.clone()))
        }

        async fn get_raw(&self, _key: &str) -> Result<Vec<u8>> {
            Err(StorageError::UnknownProvider(self.label.clone()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(StorageError::UnknownProvider(self.label.clone()))
        }

        fn label(&self) -> &str {
            &self.label
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        use chrono::TimeZone;
        (
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_failover_returns_second_provider_label() {
        let primary = Arc::new(DownBackend {
            label: "primary".to_string(),
        });
        let secondary = Arc::new(ArchiveStore::in_memory("secondary"));
        let multi = MultiStore::new(vec![primary, secondary.clone()]);
        let (from, to) = window();

        let (receipt, provider) = multi
            .put(Uuid::new_v4(), Uuid::new_v4(), from, to, b"{}\n")
            .await
            .unwrap();
        assert_eq!(provider, "secondary");

        // The object is readable through the recorded provider.
        let data = multi.get("secondary", &receipt.key).await.unwrap();
        assert_eq!(data, b"{}\n");
    }

    #[tokio::test]
    async fn test_all_providers_failed() {
        let multi = MultiStore::new(vec![
            Arc::new(DownBackend {
                label: "a".to_string(),
            }) as Arc<dyn ObjectBackend>,
            Arc::new(DownBackend {
                label: "b".to_string(),
            }),
        ]);
        let (from, to) = window();

        let err = multi
            .put(Uuid::new_v4(), Uuid::new_v4(), from, to, b"{}\n")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AllProvidersFailed(_)));
    }

    #[tokio::test]
    async fn test_unknown_provider_label() {
        let multi = MultiStore::new(vec![
            Arc::new(ArchiveStore::in_memory("memory")) as Arc<dyn ObjectBackend>
        ]);
        let err = multi.get("elsewhere", "logs/foo").await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownProvider(_)));
    }
}
