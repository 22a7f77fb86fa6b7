//! Channel index acquisition, caching, parsing, and querying.
//!
//! Data flows fetch → persist → parse → search → query. Refreshes only ever
//! produce new immutable [`IndexSnapshot`] values; the live [`PackageIndex`]
//! is swapped by the event loop, never edited in place. Platform discovery
//! and artifact downloads run as separate background jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

mod channel;
mod fetch;
mod jobs;
mod parse;
mod persist;
mod query;
mod search;
#[cfg(test)]
pub(crate) mod test_support;
mod update;
mod version;

pub use channel::{
    ChannelReference, DEFAULT_CHANNEL_ALIAS, KNOWN_PLATFORMS, current_platform, default_platforms,
    expand_channels, is_known_platform, resolve_channel_url, sorted_platforms,
};
pub use fetch::{DownloadError, FetchResult, IndexFetcher, NO_PROXY, NetworkError, NetworkSettings};
pub use jobs::{JobCompletion, JobRequest, discover_platforms, run_job, spawn_job_worker};
pub use parse::{ParseError, ParsedIndex, parse, parse_snapshot};
pub use persist::{CacheError, CacheStore, CachedIndex};
pub use query::{Cursor, QueryError, QuerySpec, ResultPage, execute, validate};
pub use search::{MatchSet, MatchTier, PackageIndex};
pub use update::{
    RefreshCompletion, RefreshOutcome, RefreshRequest, run_refresh, spawn_refresh_worker,
};
pub use version::{Version, VersionError};

/// What: Opaque marker used to ask the origin whether an index document changed.
///
/// Details:
/// - Carries the `ETag` and `Last-Modified` validators from the last full fetch.
///   Only the fetcher interprets the contents; everything else passes it along.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FreshnessToken {
    /// `ETag` response header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `Last-Modified` response header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl FreshnessToken {
    /// Whether the token carries any validator at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// What: One validated entry from a channel index.
///
/// Details:
/// - Immutable once parsed. Shared between snapshots, the package index and
///   result pages through `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageRecord {
    /// Package name (non-empty).
    pub name: String,
    /// Version with conda ordering semantics.
    pub version: Version,
    /// Build string, e.g. `py312h1234567_0`.
    pub build: String,
    /// Build number.
    pub build_number: u64,
    /// Platform subdir the artifact was published under.
    pub subdir: String,
    /// Artifact file name (`.conda` or `.tar.bz2`).
    pub file_name: String,
    /// Channel the record came from.
    pub channel: ChannelReference,
    /// Artifact size in bytes, when published.
    pub size: Option<u64>,
    /// Dependency specs in published order.
    pub depends: Vec<String>,
    /// Build timestamp in seconds since the epoch, when published.
    pub timestamp: Option<i64>,
    /// License string, when published.
    pub license: Option<String>,
    /// MD5 checksum of the artifact.
    pub md5: Option<String>,
    /// SHA-256 checksum of the artifact.
    pub sha256: Option<String>,
}

impl PackageRecord {
    /// What: Package names this record depends on, without version constraints.
    ///
    /// Output:
    /// - First whitespace-separated token of every dependency spec.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.depends
            .iter()
            .filter_map(|d| d.split_whitespace().next())
    }

    /// What: Where the artifact itself can be downloaded.
    ///
    /// Output:
    /// - `<channel base>/<record subdir>/<file name>`.
    #[must_use]
    pub fn download_url(&self) -> String {
        format!("{}/{}/{}", self.channel.base_url(), self.subdir, self.file_name)
    }
}

/// Process-wide counter handing out snapshot and index identities.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// What: Identity of an immutable snapshot or built package index.
///
/// Details:
/// - Never reused within a process, so comparing identities is enough to know
///   whether a cursor still points into the same data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// What: Every record of one channel partition at one point in time.
///
/// Details:
/// - Replaced wholesale on refresh; readers holding the old `Arc` keep a
///   consistent view until they drop it.
#[derive(Clone, Debug)]
pub struct IndexSnapshot {
    /// Identity of this snapshot.
    pub id: SnapshotId,
    /// Channel partition the records belong to.
    pub channel: ChannelReference,
    /// Validated records.
    pub records: Arc<[Arc<PackageRecord>]>,
    /// Validators for the next conditional fetch.
    pub freshness: FreshnessToken,
    /// Unix seconds when the underlying bytes were fetched from the origin.
    pub fetched_at: i64,
    /// Entries rejected by validation while parsing.
    pub skipped: usize,
}

impl IndexSnapshot {
    /// Number of valid records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Snapshot identities are unique and increasing.
    fn snapshot_ids_are_unique() {
        let a = SnapshotId::next();
        let b = SnapshotId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    /// What: Artifact URLs use the record's own subdir under the channel root.
    fn download_url_joins_channel_subdir_and_file() {
        let mut r = test_support::record("numpy", "1.26.0");
        r.subdir = "noarch".into();
        assert_eq!(
            r.download_url(),
            "https://conda.example.org/test/noarch/numpy-1.26.0-0.conda"
        );
    }

    #[test]
    /// What: Dependency names drop version constraints.
    ///
    /// - Input: `python >=3.9`, `libblas 3.9.* *_openblas`, `zlib`
    /// - Output: `python`, `libblas`, `zlib`
    fn dependency_names_strip_constraints() {
        let mut r = test_support::record("numpy", "1.26.0");
        r.depends = vec![
            "python >=3.9".into(),
            "libblas 3.9.* *_openblas".into(),
            "zlib".into(),
        ];
        let names: Vec<&str> = r.dependency_names().collect();
        assert_eq!(names, vec!["python", "libblas", "zlib"]);
    }

    #[test]
    /// What: An empty token has no validators.
    fn freshness_token_emptiness() {
        assert!(FreshnessToken::default().is_empty());
        let t = FreshnessToken {
            etag: Some("\"abc\"".into()),
            last_modified: None,
        };
        assert!(!t.is_empty());
    }
}
