//! Index document decoding and per-record validation.
//!
//! A channel publishes `repodata.json` (optionally zstd-compressed) shaped as
//! `{"info": {"subdir": ..}, "packages": {file: meta}, "packages.conda": {file: meta}}`.
//! Entries that fail validation are skipped and counted; only a document that
//! cannot be decompressed or decoded at all is an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{ChannelReference, FreshnessToken, IndexSnapshot, PackageRecord, SnapshotId, Version};

/// Frame magic of a zstd stream.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
/// Header of a bzip2 stream (`BZh`).
const BZIP2_MAGIC: [u8; 3] = *b"BZh";
/// Largest plausible timestamp in seconds (year 9999); larger values are milliseconds.
const MAX_SECONDS_TIMESTAMP: i64 = 253_402_300_799;
/// How many individual skip reasons are logged before going quiet.
const SKIP_LOG_LIMIT: usize = 5;

/// Whole-document decode failure.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The zstd stream could not be decompressed.
    #[error("failed to decompress index document: {0}")]
    Decompress(String),
    /// The document uses a compression this build cannot read.
    #[error("unsupported index compression: {0}")]
    UnsupportedCompression(&'static str),
    /// The decompressed bytes are not a valid index document.
    #[error("malformed index document: {0}")]
    Json(#[from] serde_json::Error),
}

/// What: Records recovered from one document plus the number rejected.
#[derive(Debug, Default)]
pub struct ParsedIndex {
    /// Valid records in file-name order (`packages` first, then `packages.conda`).
    pub records: Vec<PackageRecord>,
    /// Entries skipped because a field failed validation.
    pub skipped: usize,
}

/// Top-level document shape. Entries stay untyped so one bad entry cannot fail the rest.
#[derive(Deserialize)]
struct RawIndex {
    /// Channel-level metadata; only `subdir` is read.
    #[serde(default)]
    info: Option<serde_json::Value>,
    /// Legacy `.tar.bz2` artifacts.
    #[serde(default)]
    packages: BTreeMap<String, serde_json::Value>,
    /// `.conda` artifacts.
    #[serde(default, rename = "packages.conda")]
    packages_conda: BTreeMap<String, serde_json::Value>,
}

/// Typed view of one entry. A wrong JSON type in any field rejects the entry.
#[derive(Deserialize)]
struct RawRecord {
    name: Option<String>,
    version: Option<String>,
    build: Option<String>,
    build_number: Option<u64>,
    depends: Option<Vec<String>>,
    size: Option<u64>,
    timestamp: Option<i64>,
    license: Option<String>,
    md5: Option<String>,
    sha256: Option<String>,
    subdir: Option<String>,
}

/// Why a single entry was rejected.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    /// A field had the wrong JSON type.
    #[error("wrong field type: {0}")]
    Shape(serde_json::Error),
    /// `name` absent or empty.
    #[error("missing name")]
    MissingName,
    /// `version` absent or empty.
    #[error("missing version")]
    MissingVersion,
    /// `version` present but not orderable.
    #[error("bad version: {0}")]
    BadVersion(super::VersionError),
}

/// What: Undo transport compression on a raw index document.
///
/// Inputs:
/// - `raw`: Bytes as fetched or cached.
///
/// Output:
/// - Plain JSON bytes (borrowed when no decompression was needed).
///
/// # Errors
/// - `Decompress` for a corrupt zstd stream, `UnsupportedCompression` for bzip2.
fn decompress(raw: &[u8]) -> Result<std::borrow::Cow<'_, [u8]>, ParseError> {
    if raw.starts_with(&ZSTD_MAGIC) {
        return zstd::stream::decode_all(raw)
            .map(std::borrow::Cow::Owned)
            .map_err(|e| ParseError::Decompress(e.to_string()));
    }
    if raw.starts_with(&BZIP2_MAGIC) {
        return Err(ParseError::UnsupportedCompression("bzip2"));
    }
    Ok(std::borrow::Cow::Borrowed(raw))
}

/// What: Decode an index document into validated package records.
///
/// Inputs:
/// - `raw`: Document bytes, zstd-compressed or plain JSON.
/// - `channel`: Channel partition the document was fetched from.
///
/// Output:
/// - `ParsedIndex` with every valid record and the count of skipped entries.
///
/// # Errors
/// - `ParseError` when the document cannot be decompressed or decoded as a whole.
///
/// Details:
/// - Record `subdir` falls back to `info.subdir`, then to the channel's subdir.
/// - Millisecond timestamps are normalised to seconds.
pub fn parse(raw: &[u8], channel: &ChannelReference) -> Result<ParsedIndex, ParseError> {
    let plain = decompress(raw)?;
    let doc: RawIndex = serde_json::from_slice(&plain)?;
    let default_subdir = doc
        .info
        .as_ref()
        .and_then(|i| i.get("subdir"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_else(|| channel.subdir())
        .to_string();

    let mut out = ParsedIndex {
        records: Vec::with_capacity(doc.packages.len() + doc.packages_conda.len()),
        skipped: 0,
    };
    for (file_name, value) in doc.packages.into_iter().chain(doc.packages_conda) {
        match validate(file_name, value, channel, &default_subdir) {
            Ok(record) => out.records.push(record),
            Err((file_name, reason)) => {
                out.skipped += 1;
                if out.skipped <= SKIP_LOG_LIMIT {
                    debug!(channel = %channel, file = %file_name, reason = %reason, "skipping index entry");
                }
            }
        }
    }
    if out.skipped > 0 {
        warn!(
            channel = %channel,
            skipped = out.skipped,
            kept = out.records.len(),
            "index entries failed validation"
        );
    }
    Ok(out)
}

/// What: Parse a document and wrap it into a fresh immutable snapshot.
///
/// Inputs:
/// - `raw`: Document bytes.
/// - `channel`: Channel partition.
/// - `freshness`: Validators that came with the bytes.
/// - `fetched_at`: Unix seconds when the bytes were obtained from the origin.
///
/// Output:
/// - New `IndexSnapshot` with a unique identity.
///
/// # Errors
/// - Same as [`parse`].
pub fn parse_snapshot(
    raw: &[u8],
    channel: &ChannelReference,
    freshness: FreshnessToken,
    fetched_at: i64,
) -> Result<IndexSnapshot, ParseError> {
    let parsed = parse(raw, channel)?;
    let records: Arc<[Arc<PackageRecord>]> = parsed.records.into_iter().map(Arc::new).collect();
    Ok(IndexSnapshot {
        id: SnapshotId::next(),
        channel: channel.clone(),
        records,
        freshness,
        fetched_at,
        skipped: parsed.skipped,
    })
}

/// Validate one entry into a strict record, or report why it was rejected.
fn validate(
    file_name: String,
    value: serde_json::Value,
    channel: &ChannelReference,
    default_subdir: &str,
) -> Result<PackageRecord, (String, Rejection)> {
    let raw: RawRecord = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return Err((file_name, Rejection::Shape(e))),
    };
    let Some(name) = raw.name.filter(|n| !n.trim().is_empty()) else {
        return Err((file_name, Rejection::MissingName));
    };
    let Some(version_text) = raw.version.filter(|v| !v.trim().is_empty()) else {
        return Err((file_name, Rejection::MissingVersion));
    };
    let version = match Version::parse(&version_text) {
        Ok(v) => v,
        Err(e) => return Err((file_name, Rejection::BadVersion(e))),
    };
    let timestamp = raw.timestamp.map(|t| {
        if t > MAX_SECONDS_TIMESTAMP {
            t / 1000
        } else {
            t
        }
    });
    Ok(PackageRecord {
        name,
        version,
        build: raw.build.unwrap_or_default(),
        build_number: raw.build_number.unwrap_or(0),
        subdir: raw.subdir.unwrap_or_else(|| default_subdir.to_string()),
        file_name,
        channel: channel.clone(),
        size: raw.size,
        depends: raw.depends.unwrap_or_default(),
        timestamp,
        license: raw.license,
        md5: raw.md5,
        sha256: raw.sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel() -> ChannelReference {
        ChannelReference::new("https://conda.example.org/forge", "linux-64")
    }

    fn doc(packages: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "info": {"subdir": "linux-64"},
            "packages": {},
            "packages.conda": packages,
        }))
        .expect("serialize test doc")
    }

    #[test]
    /// What: A single malformed entry is skipped without discarding the others.
    ///
    /// - Input: Three valid entries plus one missing its version
    /// - Output: Three records and a skip count of one
    fn malformed_entry_is_skipped_and_counted() {
        let raw = doc(json!({
            "numpy-1.26.0-py312_0.conda": {"name": "numpy", "version": "1.26.0", "build": "py312_0", "depends": ["python >=3.12"]},
            "numpy-1.25.0-py312_0.conda": {"name": "numpy", "version": "1.25.0", "build": "py312_0"},
            "requests-2.31.0-pyhd8ed1ab_0.conda": {"name": "requests", "version": "2.31.0", "subdir": "noarch"},
            "broken-0-0.conda": {"name": "broken"},
        }));
        let parsed = parse(&raw, &channel()).expect("document decodes");
        assert_eq!(parsed.records.len(), 3);
        assert_eq!(parsed.skipped, 1);
        let requests = parsed
            .records
            .iter()
            .find(|r| r.name == "requests")
            .expect("requests kept");
        assert_eq!(requests.subdir, "noarch");
        let numpy = parsed
            .records
            .iter()
            .find(|r| r.version.as_str() == "1.26.0")
            .expect("numpy kept");
        assert_eq!(numpy.depends, vec!["python >=3.12".to_string()]);
        assert_eq!(numpy.subdir, "linux-64");
    }

    #[test]
    /// What: Wrongly typed optional fields reject only their own entry.
    ///
    /// - Input: `depends` as a string, `size` negative, empty name, unparsable version
    /// - Output: All four skipped, the valid sibling kept
    fn wrong_field_types_reject_the_entry() {
        let raw = doc(json!({
            "a-1-0.conda": {"name": "a", "version": "1", "depends": "python"},
            "b-1-0.conda": {"name": "b", "version": "1", "size": -5},
            "c-1-0.conda": {"name": "", "version": "1"},
            "d-1-0.conda": {"name": "d", "version": "1..0"},
            "ok-1-0.conda": {"name": "ok", "version": "1", "size": 42},
        }));
        let parsed = parse(&raw, &channel()).expect("document decodes");
        assert_eq!(parsed.skipped, 4);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].size, Some(42));
    }

    #[test]
    /// What: Rejection reasons render the offending detail for the skip log.
    ///
    /// - Input: One entry with a bad version, one with a wrongly typed field
    /// - Output: Messages naming the version error and the field type error
    fn rejection_reasons_render_details() {
        let (file, reason) = validate(
            "d-1-0.conda".to_string(),
            json!({"name": "d", "version": "1..0"}),
            &channel(),
            "linux-64",
        )
        .expect_err("bad version rejected");
        assert_eq!(file, "d-1-0.conda");
        assert_eq!(reason.to_string(), "bad version: empty version component");

        let (_, reason) = validate(
            "a-1-0.conda".to_string(),
            json!({"name": "a", "version": "1", "depends": "python"}),
            &channel(),
            "linux-64",
        )
        .expect_err("bad depends rejected");
        assert!(reason.to_string().starts_with("wrong field type: "));

        let (_, reason) = validate("x.conda".to_string(), json!({"version": "1"}), &channel(), "linux-64")
            .expect_err("missing name rejected");
        assert_eq!(reason.to_string(), "missing name");
    }

    #[test]
    /// What: zstd-compressed documents decode to the same records as plain ones.
    fn zstd_documents_are_decompressed() {
        let plain = doc(json!({"x-1-0.conda": {"name": "x", "version": "1", "timestamp": 1_700_000_000_123_i64}}));
        let compressed = zstd::stream::encode_all(plain.as_slice(), 3).expect("compress");
        let parsed = parse(&compressed, &channel()).expect("zstd decodes");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].timestamp, Some(1_700_000_000));
    }

    #[test]
    /// What: Decompression and decode failures are whole-document errors.
    ///
    /// - Input: Corrupt zstd frame, bzip2 header, non-JSON text
    /// - Output: `Decompress`, `UnsupportedCompression`, `Json`
    fn undecodable_documents_are_errors() {
        let garbage = [0x28, 0xB5, 0x2F, 0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            parse(&garbage, &channel()),
            Err(ParseError::Decompress(_))
        ));
        assert!(matches!(
            parse(b"BZh91AY&SY", &channel()),
            Err(ParseError::UnsupportedCompression("bzip2"))
        ));
        assert!(matches!(
            parse(b"<html>not found</html>", &channel()),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    /// What: Snapshots carry freshness, fetch time and skip count.
    fn parse_snapshot_wraps_records() {
        let raw = doc(json!({
            "x-1-0.conda": {"name": "x", "version": "1"},
            "y-0.conda": {"version": "1"},
        }));
        let token = FreshnessToken {
            etag: Some("\"v1\"".into()),
            last_modified: None,
        };
        let snap = parse_snapshot(&raw, &channel(), token.clone(), 1_234).expect("snapshot");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.freshness, token);
        assert_eq!(snap.fetched_at, 1_234);
        assert_eq!(snap.channel, channel());
    }
}
