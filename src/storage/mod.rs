//! Write-once archive storage over Apache Arrow `object_store`.
//!
//! An [`ArchiveStore`] wraps one backend (in-memory, local filesystem, or
//! any S3-compatible endpoint) and owns the compress-hash-upload path for a
//! single provider. [`MultiStore`] layers ordered failover on top.

pub mod blob;
pub mod multi;

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMode, PutOptions,
    path::Path as StoragePath,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use blob::BlobMetadata;
pub use multi::MultiStore;

const CONTENT_TYPE: &str = "application/x-ndjson+gzip";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("codec error: {0}")]
    Codec(#[from] std::io::Error),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("all providers failed, last error: {0}")]
    AllProvidersFailed(Box<StorageError>),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Receipt returned after a successful upload.
#[derive(Debug, Clone)]
pub struct PutReceipt {
    pub key: String,
    pub sha256: String,
    pub byte_count: u64,
    pub line_count: u64,
}

/// Narrow capability interface over one storage provider, so test doubles
/// and the failover wrapper can substitute reliably.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Compresses, hashes, and uploads one raw log window.
    async fn put(
        &self,
        tenant_id: Uuid,
        source_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        raw: &[u8],
    ) -> Result<PutReceipt>;

    /// Downloads and decompresses a stored object.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Downloads the stored bytes verbatim, without decompressing.
    /// The content digest authenticates exactly this representation.
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>>;

    /// Removes an object. The retention-expiry workflow is the only
    /// sanctioned caller; there is no soft delete.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable provider label recorded on the job.
    fn label(&self) -> &str;
}

/// Single-provider archive store wrapping any `object_store` backend.
#[derive(Clone)]
pub struct ArchiveStore {
    store: Arc<dyn ObjectStore>,
    label: String,
    retention_grace_days: u32,
}

impl ArchiveStore {
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>, retention_grace_days: u32) -> Self {
        Self {
            store,
            label: label.into(),
            retention_grace_days,
        }
    }

    /// In-memory store for tests and local development.
    pub fn in_memory(label: &str) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), label, 7)
    }

    fn locked_put_options(&self, meta: &BlobMetadata, to: DateTime<Utc>) -> PutOptions {
        // Write-once upload carrying the compliance attributes: the full
        // digest plus the earliest date the object may be removed.
        let retain_until = to + chrono::Duration::days(self.retention_grace_days as i64);
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, AttributeValue::from(CONTENT_TYPE));
        attributes.insert(
            Attribute::Metadata(Cow::Borrowed("sha256")),
            AttributeValue::from(meta.sha256.clone()),
        );
        attributes.insert(
            Attribute::Metadata(Cow::Borrowed("retain-until")),
            AttributeValue::from(retain_until.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        PutOptions {
            mode: PutMode::Create,
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectBackend for ArchiveStore {
    async fn put(
        &self,
        tenant_id: Uuid,
        source_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        raw: &[u8],
    ) -> Result<PutReceipt> {
        let (compressed, meta) = blob::prepare_blob(raw, tenant_id, source_id, from, to)?;
        let path = StoragePath::from(meta.key.as_str());
        let payload = bytes::Bytes::from(compressed);

        match self
            .store
            .put_opts(&path, payload.clone().into(), self.locked_put_options(&meta, to))
            .await
        {
            Ok(_) => {}
            Err(object_store::Error::AlreadyExists { .. }) => {
                // Deterministic key: a duplicate pull of the same window
                // re-derives the same object, so the rejection is a no-op.
                debug!(key = %meta.key, provider = %self.label, "object already archived");
            }
            Err(object_store::Error::NotImplemented | object_store::Error::NotSupported { .. }) => {
                // Backend without object-lock/attribute support: retry once
                // as a plain upload, trading strict immutability for
                // availability.
                self.store.put(&path, payload.into()).await?;
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            key = %meta.key,
            provider = %self.label,
            bytes = meta.byte_count,
            lines = meta.line_count,
            "log window archived"
        );

        Ok(PutReceipt {
            key: meta.key,
            sha256: meta.sha256,
            byte_count: meta.byte_count,
            line_count: meta.line_count,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let raw = self.get_raw(key).await?;
        Ok(blob::decompress(&raw)?)
    }

    async fn get_raw(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);
        let result = self.store.get(&path).await?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);
        self.store.delete(&path).await?;
        info!(key, provider = %self.label, "archived object deleted");
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
