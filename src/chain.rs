//! Tamper-evident hash chain over archive jobs and per-object digest checks.
//!
//! Each `done` job carries `chain_hash = SHA-256(prev_chain_hash ||
//! object_sha256 || job_id)`, seeded by [`GENESIS_HASH`] for the first job
//! of a source. Recomputing the chain from stored (digest, id) pairs must
//! reproduce every stored link; any edit, removal, or reordering of a job
//! breaks all links after it.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Well-known seed for the first link in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("sha256 mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },

    #[error("broken chain at job {job_id}: expected {expected}, stored {stored}")]
    BrokenLink {
        job_id: String,
        expected: String,
        stored: String,
    },
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// Hex SHA-256 of `data`.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Next link in the audit chain. Order-sensitive: the three inputs are
/// hashed as raw UTF-8 bytes in this exact sequence.
pub fn link_hash(prev_chain_hash: &str, object_sha256: &str, job_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_chain_hash.as_bytes());
    hasher.update(object_sha256.as_bytes());
    hasher.update(job_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Confirms that the SHA-256 of `data` matches `expected_hex`.
pub fn verify_digest(data: &[u8], expected_hex: &str) -> Result<()> {
    let computed = content_digest(data);
    if computed != expected_hex {
        return Err(ChainError::DigestMismatch {
            expected: expected_hex.to_string(),
            computed,
        });
    }
    Ok(())
}

/// One job's contribution to a source's chain, in creation order.
#[derive(Debug, Clone)]
pub struct ChainRecord {
    pub job_id: String,
    pub sha256: String,
    pub chain_hash: String,
}

/// Recomputes a full chain from its (digest, id) pairs and compares each
/// stored link, reporting the first divergence.
pub fn verify_chain(records: &[ChainRecord]) -> Result<()> {
    let mut prev = GENESIS_HASH.to_string();
    for record in records {
        let expected = link_hash(&prev, &record.sha256, &record.job_id);
        if expected != record.chain_hash {
            return Err(ChainError::BrokenLink {
                job_id: record.job_id.clone(),
                expected,
                stored: record.chain_hash.clone(),
            });
        }
        prev = expected;
    }
    Ok(())
}
