//! Blob preparation shared by every storage backend: line counting,
//! gzip compression, content hashing, and deterministic key derivation.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use uuid::Uuid;

use crate::chain;

/// Metadata describing a prepared blob, recorded on the owning job.
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub key: String,
    /// Hex SHA-256 of the compressed bytes, i.e. exactly what is stored.
    pub sha256: String,
    pub byte_count: u64,
    pub line_count: u64,
}

/// Compresses, hashes, and derives the object key for raw log data.
///
/// The key is a pure function of (tenant, source, window, content), so
/// re-running a pull for an already-archived window lands on the same key.
pub fn prepare_blob(
    raw: &[u8],
    tenant_id: Uuid,
    source_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> std::io::Result<(Vec<u8>, BlobMetadata)> {
    let line_count = count_lines(raw);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;

    let sha256 = chain::content_digest(&compressed);
    let key = object_key(tenant_id, source_id, from, to, &sha256);
    let byte_count = compressed.len() as u64;

    Ok((
        compressed,
        BlobMetadata {
            key,
            sha256,
            byte_count,
            line_count,
        },
    ))
}

/// `logs/<tenant>/<source>/<YYYY>/<MM>/<DD>/<from>_<to>_<sha[:8]>.ndjson.gz`
/// with the date path taken from the window start in UTC.
fn object_key(
    tenant_id: Uuid,
    source_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    sha256: &str,
) -> String {
    format!(
        "logs/{}/{}/{}/{}_{}_{}.ndjson.gz",
        tenant_id,
        source_id,
        from.format("%Y/%m/%d"),
        from.format("%Y%m%dT%H%M%SZ"),
        to.format("%Y%m%dT%H%M%SZ"),
        &sha256[..8],
    )
}

/// Inflates gzip-compressed blob contents.
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Newline-delimited line count. A trailing line without a terminator
/// still counts: it is a parsed log record all the same.
fn count_lines(raw: &[u8]) -> u64 {
    let newlines = raw.iter().filter(|&&b| b == b'\n').count() as u64;
    match raw.last() {
        None | Some(&b'\n') => newlines,
        Some(_) => newlines + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_count_lines_trailing_partial() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"{\"a\":1}\n{\"b\":2}\n"), 2);
        // Three records, no trailing newline: still three lines.
        assert_eq!(count_lines(b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}"), 3);
        assert_eq!(count_lines(b"no newline at all"), 1);
    }

    #[test]
    fn test_round_trip_preserves_content_and_digest() {
        let raw = b"{\"ray\":\"1\"}\n{\"ray\":\"2\"}\n";
        let (from, to) = window();
        let (compressed, meta) =
            prepare_blob(raw, Uuid::new_v4(), Uuid::new_v4(), from, to).unwrap();

        assert_eq!(meta.byte_count, compressed.len() as u64);
        assert_eq!(meta.sha256, chain::content_digest(&compressed));
        assert_eq!(decompress(&compressed).unwrap(), raw);
    }

    #[test]
    fn test_key_is_deterministic_for_same_inputs() {
        let raw = b"{\"ray\":\"1\"}\n";
        let tenant = Uuid::new_v4();
        let source = Uuid::new_v4();
        let (from, to) = window();

        let (_, first) = prepare_blob(raw, tenant, source, from, to).unwrap();
        let (_, second) = prepare_blob(raw, tenant, source, from, to).unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(first.sha256, second.sha256);
    }

    #[test]
    fn test_key_layout() {
        let raw = b"{}\n";
        let tenant = Uuid::nil();
        let source = Uuid::nil();
        let (from, to) = window();

        let (_, meta) = prepare_blob(raw, tenant, source, from, to).unwrap();
        let expected_prefix = format!(
            "logs/{tenant}/{source}/2025/03/14/20250314T090000Z_20250314T100000Z_{}",
            &meta.sha256[..8]
        );
        assert_eq!(meta.key, format!("{expected_prefix}.ndjson.gz"));
    }
}
