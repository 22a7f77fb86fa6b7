//! Conditional download of channel index documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{ChannelReference, FreshnessToken, PackageRecord};

/// Document names tried in order; the plain one is only used when the compressed one is missing.
const DOCUMENT_NAMES: [&str; 2] = ["repodata.json.zst", "repodata.json"];
/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Proxy setting value that disables proxies, including ones from the environment.
pub const NO_PROXY: &str = "none";
/// Whole-request timeout for artifact downloads, which can be far larger than an index.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
/// Suffix of the partial file an artifact is streamed into.
const PARTIAL_SUFFIX: &str = ".part";

/// What: Network knobs supplied by configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Proxy URL; `None` uses the environment, `Some("none")` disables proxies.
    pub proxy: Option<String>,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    pub retry_backoff: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Why a fetch did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The request exceeded its timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// No connection could be established.
    #[error("could not connect to {url}: {message}")]
    Connect {
        /// Requested URL.
        url: String,
        /// Transport error text.
        message: String,
    },
    /// The origin answered with an error status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Any other transport failure (reset connection, truncated body, ...).
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error text.
        message: String,
    },
    /// The HTTP client could not be built from the settings.
    #[error("invalid network settings: {0}")]
    Client(String),
}

impl NetworkError {
    /// What: Whether retrying the same request may succeed.
    ///
    /// Output:
    /// - `true` for timeouts, connection and transport failures, 5xx, 408 and 429.
    /// - `false` for other 4xx and client configuration errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Client(_) => false,
        }
    }

    /// Build from a reqwest error, classifying timeouts and connect failures.
    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// Why an artifact download did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request or the body transfer failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Writing the file failed.
    #[error("could not write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The downloaded bytes do not match the published checksum.
    #[error("sha256 mismatch: expected {expected}, got {actual}")]
    Checksum {
        /// Checksum from the index.
        expected: String,
        /// Checksum of the received bytes.
        actual: String,
    },
}

/// Outcome of one fetch for one channel partition.
#[derive(Debug)]
pub enum FetchResult {
    /// The origin confirmed the known token is still current.
    NotModified,
    /// A full document was downloaded.
    Fetched {
        /// Document bytes exactly as served.
        raw: Vec<u8>,
        /// Validators to present on the next fetch.
        freshness: FreshnessToken,
    },
    /// Retries exhausted or a permanent failure.
    Failed(NetworkError),
}

/// Response of a single attempt against one URL.
enum Attempt {
    /// HTTP 304.
    NotModified,
    /// HTTP 2xx with body.
    Body(Vec<u8>, FreshnessToken),
}

/// What: HTTP client for channel index documents.
///
/// Details:
/// - Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct IndexFetcher {
    /// Pooled client configured from the settings.
    client: reqwest::Client,
    /// Retry policy.
    settings: NetworkSettings,
}

impl IndexFetcher {
    /// What: Build a fetcher from network settings.
    ///
    /// # Errors
    /// - `NetworkError::Client` if the proxy URL is invalid or the client cannot be built.
    pub fn new(settings: NetworkSettings) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .user_agent(format!("pixi-browse/{}", env!("CARGO_PKG_VERSION")));
        match settings.proxy.as_deref() {
            Some(p) if p.eq_ignore_ascii_case(NO_PROXY) => builder = builder.no_proxy(),
            Some(p) => {
                let proxy =
                    reqwest::Proxy::all(p).map_err(|e| NetworkError::Client(e.to_string()))?;
                builder = builder.proxy(proxy);
            }
            None => {}
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Settings the fetcher was built with.
    #[must_use]
    pub const fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// What: Fetch the index document of a channel partition.
    ///
    /// Inputs:
    /// - `channel`: Partition to fetch.
    /// - `known`: Validators from the cached copy, if any.
    ///
    /// Output:
    /// - `NotModified` when the origin confirms `known`, `Fetched` with new bytes
    ///   and validators, or `Failed` with the last error.
    ///
    /// Details:
    /// - Tries `repodata.json.zst` first and falls back to `repodata.json` on 404.
    /// - Transient failures are retried with exponential backoff plus jitter;
    ///   permanent ones return immediately.
    pub async fn fetch(
        &self,
        channel: &ChannelReference,
        known: Option<&FreshnessToken>,
    ) -> FetchResult {
        let mut last_err = None;
        for name in DOCUMENT_NAMES {
            let url = channel.document_url(name);
            match self.fetch_with_retry(&url, known).await {
                Ok(Attempt::NotModified) => {
                    debug!(url = %url, "index not modified");
                    return FetchResult::NotModified;
                }
                Ok(Attempt::Body(raw, freshness)) => {
                    info!(url = %url, bytes = raw.len(), "fetched index document");
                    return FetchResult::Fetched { raw, freshness };
                }
                Err(e @ NetworkError::Status { status: 404, .. }) => {
                    debug!(url = %url, "index document not found, trying next name");
                    last_err = Some(e);
                }
                Err(e) => return FetchResult::Failed(e),
            }
        }
        FetchResult::Failed(last_err.unwrap_or_else(|| NetworkError::Status {
            url: channel.to_string(),
            status: 404,
        }))
    }

    /// Run `fetch_once` until it succeeds, fails permanently, or retries run out.
    async fn fetch_with_retry(
        &self,
        url: &str,
        known: Option<&FreshnessToken>,
    ) -> Result<Attempt, NetworkError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(url, known).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.settings.retry_backoff, attempt);
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.settings.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "index fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, transient = e.is_transient(), "index fetch failed");
                    return Err(e);
                }
            }
        }
    }

    /// One conditional GET.
    async fn fetch_once(
        &self,
        url: &str,
        known: Option<&FreshnessToken>,
    ) -> Result<Attempt, NetworkError> {
        let mut request = self.client.get(url);
        if let Some(token) = known {
            if let Some(etag) = &token.etag {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &token.last_modified {
                request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
            }
        }
        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, &e))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(Attempt::NotModified);
        }
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(ToString::to_string)
        };
        let freshness = FreshnessToken {
            etag: header(reqwest::header::ETAG),
            last_modified: header(reqwest::header::LAST_MODIFIED),
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, &e))?;
        Ok(Attempt::Body(body.to_vec(), freshness))
    }
}

impl IndexFetcher {
    /// What: Check whether a channel publishes an index for `subdir`.
    ///
    /// Inputs:
    /// - `base_url`: Channel root.
    /// - `subdir`: Platform subdir to look for.
    ///
    /// Output:
    /// - `true` when `HEAD <base>/<subdir>/repodata.json` answers 2xx.
    ///
    /// Details:
    /// - One attempt, no retries; any failure counts as "not published".
    pub async fn publishes(&self, base_url: &str, subdir: &str) -> bool {
        let url = ChannelReference::new(base_url, subdir).document_url("repodata.json");
        match self.client.head(&url).send().await {
            Ok(response) => {
                let found = response.status().is_success();
                debug!(url = %url, status = response.status().as_u16(), found, "checked platform index");
                found
            }
            Err(e) => {
                debug!(url = %url, error = %e, "platform index check failed");
                false
            }
        }
    }

    /// What: Download the artifact of `record` to `destination`.
    ///
    /// Inputs:
    /// - `record`: Record whose artifact to fetch.
    /// - `destination`: Final file path.
    ///
    /// Output:
    /// - Number of bytes written.
    ///
    /// # Errors
    /// - `DownloadError::Network` for transport failures and non-2xx statuses.
    /// - `DownloadError::Io` when the file cannot be written or moved into place.
    /// - `DownloadError::Checksum` when the record carries a SHA-256 that does not match.
    ///
    /// Details:
    /// - The body is streamed into `<destination>.part`, which is renamed over
    ///   `destination` only after the checksum passed; it is removed on failure.
    pub async fn download(
        &self,
        record: &PackageRecord,
        destination: &Path,
    ) -> Result<u64, DownloadError> {
        let mut partial = destination.as_os_str().to_owned();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        let result = self.stream_to(record, &partial).await;
        let finished = match result {
            Ok(written) => tokio::fs::rename(&partial, destination)
                .await
                .map(|()| written)
                .map_err(|source| DownloadError::Io {
                    path: destination.to_path_buf(),
                    source,
                }),
            Err(e) => Err(e),
        };
        if finished.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        finished
    }

    /// Stream the artifact body into `path`, verifying the checksum when one is published.
    async fn stream_to(&self, record: &PackageRecord, path: &Path) -> Result<u64, DownloadError> {
        let url = record.download_url();
        let io_err = |source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut response = self
            .client
            .get(&url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }
        let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| NetworkError::from_reqwest(&url, &e))?
        {
            hasher.update(&chunk);
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        if let Some(expected) = &record.sha256 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(DownloadError::Checksum {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        info!(url = %url, bytes = written, "downloaded artifact");
        Ok(written)
    }
}

/// What: Sleep before retry number `attempt` (1-based).
///
/// Details:
/// - `base * 2^(attempt-1)`, capped at 30s, plus up to half of `base` of random jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    let exp = base.saturating_mul(factor).min(MAX_BACKOFF);
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = if base_ms < 2 {
        0
    } else {
        rand::random_range(0..=base_ms / 2)
    };
    exp + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::{TestOrigin, response, serve};
    use tokio::net::TcpListener;

    fn fetcher(max_retries: u32) -> IndexFetcher {
        IndexFetcher::new(NetworkSettings {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            proxy: Some(NO_PROXY.to_string()),
            max_retries,
            retry_backoff: Duration::from_millis(1),
        })
        .expect("client builds")
    }

    fn channel(origin: &TestOrigin) -> ChannelReference {
        origin.channel()
    }

    #[tokio::test]
    /// What: A 200 response yields the body and both validators.
    async fn fetch_returns_body_and_validators() {
        let origin = serve(|_, _| {
            response(
                "200 OK",
                &[("ETag", "\"v1\""), ("Last-Modified", "Tue, 01 Oct 2024 10:00:00 GMT")],
                b"{\"packages\":{}}",
            )
        })
        .await;
        match fetcher(0).fetch(&channel(&origin), None).await {
            FetchResult::Fetched { raw, freshness } => {
                assert_eq!(raw, b"{\"packages\":{}}");
                assert_eq!(freshness.etag.as_deref(), Some("\"v1\""));
                assert!(freshness.last_modified.is_some());
            }
            other => panic!("expected Fetched, got {other:?}"),
        }
        let requests = origin.requests();
        assert!(requests[0].starts_with("get /chan/noarch/repodata.json.zst "));
        assert!(!requests[0].contains("if-none-match"));
    }

    #[tokio::test]
    /// What: A known token is sent as validators and a 304 short-circuits.
    async fn known_token_yields_not_modified() {
        let origin = serve(|head, _| {
            if head.contains("if-none-match: \"v1\"") {
                response("304 Not Modified", &[], b"")
            } else {
                response("200 OK", &[], b"{}")
            }
        })
        .await;
        let token = FreshnessToken {
            etag: Some("\"v1\"".into()),
            last_modified: Some("Tue, 01 Oct 2024 10:00:00 GMT".into()),
        };
        let result = fetcher(0).fetch(&channel(&origin), Some(&token)).await;
        assert!(matches!(result, FetchResult::NotModified));
        let requests = origin.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("if-modified-since: tue, 01 oct 2024"));
    }

    #[tokio::test]
    /// What: A missing compressed document falls back to the plain one.
    async fn missing_zst_falls_back_to_plain_json() {
        let origin = serve(|head, _| {
            if head.starts_with("get /chan/noarch/repodata.json.zst ") {
                response("404 Not Found", &[], b"")
            } else {
                response("200 OK", &[], b"{}")
            }
        })
        .await;
        let result = fetcher(3).fetch(&channel(&origin), None).await;
        assert!(matches!(result, FetchResult::Fetched { .. }));
        let requests = origin.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("get /chan/noarch/repodata.json "));
    }

    #[tokio::test]
    /// What: Server errors are retried until one attempt succeeds.
    ///
    /// - Input: Two 503 responses, then 200; three retries allowed
    /// - Output: Fetched after exactly three requests
    async fn transient_errors_are_retried() {
        let origin = serve(|_, index| {
            if index < 2 {
                response("503 Service Unavailable", &[], b"")
            } else {
                response("200 OK", &[], b"{}")
            }
        })
        .await;
        let result = fetcher(3).fetch(&channel(&origin), None).await;
        assert!(matches!(result, FetchResult::Fetched { .. }));
        assert_eq!(origin.requests().len(), 3);
    }

    #[tokio::test]
    /// What: Client errors other than 404 fail at once without retry or fallback.
    async fn client_errors_are_permanent() {
        let origin = serve(|_, _| response("403 Forbidden", &[], b"")).await;
        match fetcher(3).fetch(&channel(&origin), None).await {
            FetchResult::Failed(e) => {
                assert!(matches!(e, NetworkError::Status { status: 403, .. }));
                assert!(!e.is_transient());
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(origin.requests().len(), 1);
    }

    #[tokio::test]
    /// What: Exhausted retries surface the last transient error.
    async fn retries_are_bounded() {
        let origin = serve(|_, _| response("500 Internal Server Error", &[], b"")).await;
        match fetcher(2).fetch(&channel(&origin), None).await {
            FetchResult::Failed(e) => assert!(e.is_transient()),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(origin.requests().len(), 3);
    }

    #[tokio::test]
    /// What: A refused connection is a transient connect failure.
    async fn refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let reference = ChannelReference::new(format!("http://{addr}/chan"), "noarch");
        match fetcher(0).fetch(&reference, None).await {
            FetchResult::Failed(e) => assert!(e.is_transient(), "{e}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    /// Record served by `origin` under `noarch`, optionally with a checksum.
    fn artifact(origin: &TestOrigin, sha256: Option<&str>) -> PackageRecord {
        let mut record = crate::index::test_support::record("tool", "1.0");
        record.channel = origin.channel();
        record.subdir = "noarch".into();
        record.sha256 = sha256.map(ToString::to_string);
        record
    }

    #[tokio::test]
    /// What: An artifact is streamed to disk and its checksum verified.
    ///
    /// - Input: Origin serving `payload` for the artifact URL; record with the matching SHA-256
    /// - Output: File with the payload, no partial file left, one GET for the artifact path
    async fn download_writes_verified_artifact() {
        let payload = b"conda artifact bytes".to_vec();
        let digest = format!("{:x}", Sha256::digest(&payload));
        let body = payload.clone();
        let origin = serve(move |_, _| response("200 OK", &[], &body)).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("tool-1.0-0.conda");
        let written = fetcher(0)
            .download(&artifact(&origin, Some(&digest)), &dest)
            .await
            .expect("download succeeds");
        assert_eq!(written, payload.len() as u64);
        assert_eq!(std::fs::read(&dest).expect("artifact written"), payload);
        assert!(!dir.path().join("tool-1.0-0.conda.part").exists());
        assert!(origin.requests()[0].starts_with("get /chan/noarch/tool-1.0-0.conda "));
    }

    #[tokio::test]
    /// What: A checksum mismatch or an error status leaves no file behind.
    async fn failed_download_leaves_nothing() {
        let origin = serve(|head, _| {
            if head.contains("missing") {
                response("404 Not Found", &[], b"")
            } else {
                response("200 OK", &[], b"tampered")
            }
        })
        .await;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("tool-1.0-0.conda");
        let err = fetcher(0)
            .download(&artifact(&origin, Some("00ff")), &dest)
            .await
            .expect_err("checksum mismatch");
        assert!(matches!(err, DownloadError::Checksum { .. }));
        assert!(!dest.exists());

        let mut missing = artifact(&origin, None);
        missing.file_name = "missing-1.0-0.conda".into();
        let err = fetcher(0)
            .download(&missing, &dest)
            .await
            .expect_err("404");
        assert!(matches!(
            err,
            DownloadError::Network(NetworkError::Status { status: 404, .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
    }

    #[tokio::test]
    /// What: Probing reports only subdirs whose index answers 2xx.
    async fn publishes_checks_index_presence() {
        let origin = serve(|head, _| {
            if head.starts_with("head /chan/linux-64/repodata.json ") {
                response("200 OK", &[], b"")
            } else {
                response("404 Not Found", &[], b"")
            }
        })
        .await;
        let f = fetcher(3);
        assert!(f.publishes(&origin.base_url, "linux-64").await);
        assert!(!f.publishes(&origin.base_url, "win-64").await);
        assert_eq!(origin.requests().len(), 2);
    }

    #[test]
    /// What: Backoff grows exponentially and stays capped.
    fn backoff_grows_and_caps() {
        let base = Duration::from_millis(100);
        let first = backoff_delay(base, 1);
        let third = backoff_delay(base, 3);
        assert!(first >= base && first <= Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(450));
        assert!(backoff_delay(base, 40) <= MAX_BACKOFF + Duration::from_millis(50));
    }

    #[test]
    /// What: Status classification separates retryable from permanent codes.
    fn status_classification() {
        let status = |status| NetworkError::Status {
            url: String::new(),
            status,
        };
        assert!(status(502).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(401).is_transient());
        assert!(!NetworkError::Client("bad proxy".into()).is_transient());
    }
}
