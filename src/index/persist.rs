//! On-disk cache of raw index documents.
//!
//! One file per channel partition, named by a SHA-256 of the partition URL.
//! Each file is a single JSON header line followed by the raw document bytes.
//! The header carries the freshness validators plus a length and checksum of
//! the body, so a torn or tampered file is detected and treated as a miss.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{ChannelReference, FreshnessToken, IndexSnapshot, parse_snapshot};

/// Layout version written into every header.
const CACHE_FORMAT: u32 = 1;
/// File extension of cache entries.
const CACHE_EXT: &str = "repodata";

/// Serialises the compare-and-replace of entries within this process.
static SAVE_LOCK: Mutex<()> = Mutex::new(());

/// Reasons a cache entry could not be used. Never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the entry failed.
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// No header line terminator was found.
    #[error("cache entry has no header")]
    MissingHeader,
    /// The header line is not valid JSON.
    #[error("cache header is malformed: {0}")]
    Header(#[from] serde_json::Error),
    /// The header was written by an incompatible layout.
    #[error("unsupported cache format {0}")]
    Format(u32),
    /// The entry belongs to another channel (hash collision or manual copy).
    #[error("cache entry belongs to {0}")]
    ChannelMismatch(String),
    /// The body is shorter or longer than recorded.
    #[error("cache body is {actual} bytes, header says {expected}")]
    Length {
        /// Length recorded in the header.
        expected: u64,
        /// Length found on disk.
        actual: u64,
    },
    /// The body checksum differs from the header.
    #[error("cache body checksum mismatch")]
    Checksum,
    /// The body passed integrity checks but is not a decodable index.
    #[error("cached document is unreadable: {0}")]
    Document(#[from] super::ParseError),
}

/// Header line preceding the raw document bytes.
#[derive(serde::Serialize, serde::Deserialize)]
struct CacheHeader {
    /// Layout version.
    format: u32,
    /// Full channel partition URL, guards against hash collisions.
    channel: String,
    /// Validators for the next conditional fetch.
    #[serde(flatten)]
    freshness: FreshnessToken,
    /// Unix seconds when the document was stored.
    saved_at: i64,
    /// Unix milliseconds when the refresh that produced the body was requested.
    #[serde(default)]
    requested_at: i64,
    /// Body length in bytes.
    len: u64,
    /// Lowercase hex SHA-256 of the body.
    sha256: String,
}

/// What: Raw cached document plus its metadata, before parsing.
#[derive(Debug, Clone)]
pub struct CachedIndex {
    /// Document bytes exactly as fetched.
    pub raw: Vec<u8>,
    /// Validators stored with the document.
    pub freshness: FreshnessToken,
    /// Unix seconds when the document was stored.
    pub saved_at: i64,
}

/// What: File-backed store of raw index documents, one entry per channel partition.
///
/// Details:
/// - All methods do blocking file I/O and are meant to run on a blocking pool
///   (`tokio::task::spawn_blocking`), never on the event loop.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory holding the entries.
    root: PathBuf,
}

/// Lowercase hex SHA-256 of `bytes`.
fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl CacheStore {
    /// Create a store rooted at `root`; the directory is created lazily on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// What: Entry path for a channel partition.
    ///
    /// Details:
    /// - Name is the first 32 hex digits of SHA-256 over `<base_url>/<subdir>`,
    ///   stable across runs and platforms.
    #[must_use]
    pub fn path_for(&self, channel: &ChannelReference) -> PathBuf {
        let digest = sha256_hex(channel.to_string().as_bytes());
        self.root.join(format!("{}.{CACHE_EXT}", &digest[..32]))
    }

    /// What: Load and parse the cached snapshot of a channel partition.
    ///
    /// Inputs:
    /// - `channel`: Partition to look up.
    ///
    /// Output:
    /// - `Some((snapshot, token))` for a valid entry; `None` when missing or unusable.
    ///
    /// Details:
    /// - Corruption of any kind is logged and reported as a miss, never as an error.
    #[must_use]
    pub fn load(&self, channel: &ChannelReference) -> Option<(IndexSnapshot, FreshnessToken)> {
        let result = self.load_raw(channel).and_then(|cached| {
            let snapshot =
                parse_snapshot(&cached.raw, channel, cached.freshness.clone(), cached.saved_at)?;
            Ok((snapshot, cached.freshness))
        });
        match result {
            Ok(found) => {
                debug!(channel = %channel, records = found.0.len(), "loaded index from cache");
                Some(found)
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(channel = %channel, "no cached index");
                None
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "ignoring unusable cache entry");
                None
            }
        }
    }

    /// What: Read and integrity-check a cache entry without parsing the document.
    ///
    /// # Errors
    /// - Any `CacheError` describing why the entry cannot be trusted.
    pub fn load_raw(&self, channel: &ChannelReference) -> Result<CachedIndex, CacheError> {
        let bytes = fs::read(self.path_for(channel))?;
        let split = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(CacheError::MissingHeader)?;
        let header: CacheHeader = serde_json::from_slice(&bytes[..split])?;
        if header.format != CACHE_FORMAT {
            return Err(CacheError::Format(header.format));
        }
        if header.channel != channel.to_string() {
            return Err(CacheError::ChannelMismatch(header.channel));
        }
        let body = &bytes[split + 1..];
        let actual = body.len() as u64;
        if actual != header.len {
            return Err(CacheError::Length {
                expected: header.len,
                actual,
            });
        }
        if sha256_hex(body) != header.sha256 {
            return Err(CacheError::Checksum);
        }
        Ok(CachedIndex {
            raw: body.to_vec(),
            freshness: header.freshness,
            saved_at: header.saved_at,
        })
    }

    /// What: Store a raw document and its validators for a channel partition.
    ///
    /// Inputs:
    /// - `channel`: Partition the document belongs to.
    /// - `raw`: Document bytes exactly as fetched.
    /// - `freshness`: Validators returned with the document.
    ///
    /// Output:
    /// - `Ok(())` once the new entry is in place.
    ///
    /// # Errors
    /// - `CacheError::Io` if the directory, temp file, or rename fails.
    ///
    /// Details:
    /// - Unconditional; stamps the entry with the current time as request time.
    pub fn save(
        &self,
        channel: &ChannelReference,
        raw: &[u8],
        freshness: &FreshnessToken,
    ) -> Result<(), CacheError> {
        let _guard = SAVE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_entry(channel, raw, freshness, chrono::Utc::now().timestamp_millis())
    }

    /// What: Store a document unless the entry on disk came from a later request.
    ///
    /// Inputs:
    /// - `channel`: Partition the document belongs to.
    /// - `raw`: Document bytes exactly as fetched.
    /// - `freshness`: Validators returned with the document.
    /// - `requested_at`: Unix milliseconds when the producing refresh was requested.
    ///
    /// Output:
    /// - `Ok(true)` when written, `Ok(false)` when a newer entry was kept.
    ///
    /// # Errors
    /// - `CacheError::Io` if the directory, temp file, or rename fails.
    ///
    /// Details:
    /// - Refreshes of one channel overlap and finish in any order; the check and
    ///   the rename happen under one lock so a slow older fetch cannot replace
    ///   the bytes of a newer one. An unreadable existing entry is replaced.
    pub fn save_if_newer(
        &self,
        channel: &ChannelReference,
        raw: &[u8],
        freshness: &FreshnessToken,
        requested_at: i64,
    ) -> Result<bool, CacheError> {
        let _guard = SAVE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stored) = self.stored_request_time(channel)
            && stored > requested_at
        {
            debug!(
                channel = %channel,
                stored,
                requested_at,
                "keeping newer cache entry"
            );
            return Ok(false);
        }
        self.write_entry(channel, raw, freshness, requested_at)?;
        Ok(true)
    }

    /// Request time recorded in the existing entry's header, if it can be read.
    fn stored_request_time(&self, channel: &ChannelReference) -> Option<i64> {
        let file = fs::File::open(self.path_for(channel)).ok()?;
        let mut line = Vec::new();
        BufReader::new(file).read_until(b'\n', &mut line).ok()?;
        let header: CacheHeader = serde_json::from_slice(line.strip_suffix(b"\n")?).ok()?;
        (header.format == CACHE_FORMAT).then_some(header.requested_at)
    }

    /// Write the entry through a synced temp file renamed over the old one.
    ///
    /// Readers see either the old entry or the new one. Callers hold `SAVE_LOCK`.
    fn write_entry(
        &self,
        channel: &ChannelReference,
        raw: &[u8],
        freshness: &FreshnessToken,
        requested_at: i64,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root)?;
        let header = CacheHeader {
            format: CACHE_FORMAT,
            channel: channel.to_string(),
            freshness: freshness.clone(),
            saved_at: chrono::Utc::now().timestamp(),
            requested_at,
            len: raw.len() as u64,
            sha256: sha256_hex(raw),
        };
        let path = self.path_for(channel);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer(&mut tmp, &header)?;
        tmp.write_all(b"\n")?;
        tmp.write_all(raw)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
        debug!(
            channel = %channel,
            path = %path.display(),
            bytes = raw.len(),
            "saved index to cache"
        );
        Ok(())
    }
}
