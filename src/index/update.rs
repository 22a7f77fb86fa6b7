//! Background refresh of channel snapshots.
//!
//! A refresh runs entirely off the event loop: cache load, conditional fetch,
//! decode and cache save. Its only output is a [`RefreshCompletion`] message;
//! nothing here touches the live package index.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    CacheStore, ChannelReference, FetchResult, FreshnessToken, IndexFetcher, IndexSnapshot,
    parse_snapshot,
};

/// What: Request to refresh one channel partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Partition to refresh.
    pub channel: ChannelReference,
    /// Sequence number assigned by the session when the refresh started.
    pub generation: u64,
    /// Validators of the snapshot the session already holds, if any.
    pub known: Option<FreshnessToken>,
    /// Whether the on-disk cache may be read and written.
    pub use_cache: bool,
    /// Unix milliseconds when the session issued the request; orders cache writes.
    pub requested_at: i64,
}

/// Result of one refresh, as seen by the session.
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    /// The held snapshot is still current; nothing to rebuild.
    NotModified,
    /// A new snapshot from the origin, or from a cache the origin confirmed current.
    Updated(Arc<IndexSnapshot>),
    /// The origin failed but a cached snapshot could be used instead.
    Restored {
        /// Snapshot read from the cache.
        snapshot: Arc<IndexSnapshot>,
        /// Why the origin could not be used.
        reason: String,
    },
    /// Nothing usable was produced.
    Failed(String),
}

/// What: Typed completion event delivered to the event loop.
#[derive(Clone, Debug)]
pub struct RefreshCompletion {
    /// Partition the refresh was for.
    pub channel: ChannelReference,
    /// Generation copied from the request.
    pub generation: u64,
    /// What the refresh produced.
    pub outcome: RefreshOutcome,
}

/// What: Perform one refresh.
///
/// Inputs:
/// - `request`: Channel, generation, known validators and cache policy.
/// - `fetcher`: HTTP client.
/// - `store`: On-disk cache.
///
/// Output:
/// - `RefreshCompletion` carrying the request's channel and generation.
///
/// Details:
/// - Without a held snapshot the cache is loaded first and its validators are
///   sent, so an unchanged origin answers 304 and the cached copy is used as is.
/// - Decoding and cache I/O run on the blocking pool.
/// - The cache is written only if no later request already stored its bytes.
/// - Network or decode failure falls back to the cached snapshot when one was loaded.
pub async fn run_refresh(
    request: RefreshRequest,
    fetcher: &IndexFetcher,
    store: &CacheStore,
) -> RefreshCompletion {
    let RefreshRequest {
        channel,
        generation,
        known,
        use_cache,
        requested_at,
    } = request;

    let cached = if known.is_none() && use_cache {
        let store = store.clone();
        let key = channel.clone();
        tokio::task::spawn_blocking(move || store.load(&key))
            .await
            .ok()
            .flatten()
            .map(|(snapshot, _)| Arc::new(snapshot))
    } else {
        None
    };
    let token = known
        .as_ref()
        .or_else(|| cached.as_ref().map(|s| &s.freshness))
        .filter(|t| !t.is_empty());

    let fetched = fetcher.fetch(&channel, token).await;
    let outcome = match fetched {
        FetchResult::NotModified => match cached {
            Some(snapshot) => {
                info!(channel = %channel, records = snapshot.len(), "cached index is current");
                RefreshOutcome::Updated(snapshot)
            }
            None if known.is_some() => RefreshOutcome::NotModified,
            None => RefreshOutcome::Failed(format!(
                "{}: origin reported no change but nothing is cached",
                channel.short_name()
            )),
        },
        FetchResult::Fetched { raw, freshness } => {
            let cache = use_cache.then_some((store, requested_at));
            decode_and_store(&channel, raw, freshness, cache, cached).await
        }
        FetchResult::Failed(e) => fallback(&channel, cached, e.to_string()),
    };
    debug!(channel = %channel, generation, outcome = ?OutcomeKind::of(&outcome), "refresh finished");
    RefreshCompletion {
        channel,
        generation,
        outcome,
    }
}

/// Outcome label for logs without dumping snapshots.
#[derive(Debug)]
enum OutcomeKind {
    /// See [`RefreshOutcome::NotModified`].
    NotModified,
    /// See [`RefreshOutcome::Updated`].
    Updated,
    /// See [`RefreshOutcome::Restored`].
    Restored,
    /// See [`RefreshOutcome::Failed`].
    Failed,
}

impl OutcomeKind {
    /// Label of `outcome`.
    const fn of(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::NotModified => Self::NotModified,
            RefreshOutcome::Updated(_) => Self::Updated,
            RefreshOutcome::Restored { .. } => Self::Restored,
            RefreshOutcome::Failed(_) => Self::Failed,
        }
    }
}

/// Decode freshly fetched bytes and, on success, write them to the cache.
///
/// `cache` carries the store and the request time when caching is enabled.
async fn decode_and_store(
    channel: &ChannelReference,
    raw: Vec<u8>,
    freshness: FreshnessToken,
    cache: Option<(&CacheStore, i64)>,
    cached: Option<Arc<IndexSnapshot>>,
) -> RefreshOutcome {
    let raw = Arc::new(raw);
    let fetched_at = chrono::Utc::now().timestamp();
    let parsed = {
        let raw = Arc::clone(&raw);
        let channel = channel.clone();
        let freshness = freshness.clone();
        tokio::task::spawn_blocking(move || parse_snapshot(&raw, &channel, freshness, fetched_at))
            .await
    };
    let snapshot = match parsed {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => return fallback(channel, cached, e.to_string()),
        Err(e) => return fallback(channel, cached, format!("decoder task failed: {e}")),
    };
    info!(
        channel = %channel,
        records = snapshot.len(),
        skipped = snapshot.skipped,
        "index decoded"
    );
    if let Some((store, requested_at)) = cache {
        let store = store.clone();
        let key = channel.clone();
        let saved = tokio::task::spawn_blocking(move || {
            store.save_if_newer(&key, &raw, &freshness, requested_at)
        })
        .await;
        match saved {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(channel = %channel, "newer refresh already cached"),
            Ok(Err(e)) => warn!(channel = %channel, error = %e, "failed to write index cache"),
            Err(e) => warn!(channel = %channel, error = %e, "cache writer task failed"),
        }
    }
    RefreshOutcome::Updated(Arc::new(snapshot))
}

/// Use the cached snapshot when the origin could not deliver one.
fn fallback(
    channel: &ChannelReference,
    cached: Option<Arc<IndexSnapshot>>,
    reason: String,
) -> RefreshOutcome {
    match cached {
        Some(snapshot) => {
            warn!(channel = %channel, reason = %reason, "using cached index after refresh failure");
            RefreshOutcome::Restored { snapshot, reason }
        }
        None => {
            warn!(channel = %channel, reason = %reason, "refresh failed");
            RefreshOutcome::Failed(format!("{}: {reason}", channel.short_name()))
        }
    }
}

/// What: Spawn the worker that turns refresh requests into completion events.
///
/// Inputs:
/// - `requests`: Refresh requests from the session.
/// - `completions`: Sender for completion events to the event loop.
/// - `fetcher`: Shared HTTP client.
/// - `store`: On-disk cache.
///
/// Details:
/// - Each request runs as its own task; a newer request never cancels an older
///   one. Ordering is resolved by the session using the generation numbers.
/// - The worker exits when the request channel closes.
pub fn spawn_refresh_worker(
    mut requests: mpsc::UnboundedReceiver<RefreshRequest>,
    completions: mpsc::UnboundedSender<RefreshCompletion>,
    fetcher: IndexFetcher,
    store: CacheStore,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            debug!(channel = %request.channel, generation = request.generation, "refresh requested");
            let fetcher = fetcher.clone();
            let store = store.clone();
            let completions = completions.clone();
            tokio::spawn(async move {
                let completion = run_refresh(request, &fetcher, &store).await;
                let _ = completions.send(completion);
            });
        }
        debug!("refresh worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::{repodata, response, serve};
    use crate::index::{NO_PROXY, NetworkSettings};
    use std::time::Duration;

    fn fetcher() -> IndexFetcher {
        IndexFetcher::new(NetworkSettings {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            proxy: Some(NO_PROXY.to_string()),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
        })
        .expect("client builds")
    }

    fn request(channel: &ChannelReference, generation: u64, known: Option<FreshnessToken>) -> RefreshRequest {
        RefreshRequest {
            channel: channel.clone(),
            generation,
            known,
            use_cache: true,
            requested_at: i64::try_from(generation).unwrap_or(i64::MAX),
        }
    }

    #[tokio::test]
    /// What: A fetched document is decoded, cached and reported as updated.
    async fn fetched_document_is_decoded_and_cached() {
        let body = repodata(&[("numpy", "1.26.0"), ("requests", "2.31.0")]);
        let origin = serve(move |_, _| response("200 OK", &[("ETag", "\"v1\"")], &body)).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let completion = run_refresh(request(&origin.channel(), 7, None), &fetcher(), &store).await;
        assert_eq!(completion.generation, 7);
        match completion.outcome {
            RefreshOutcome::Updated(snapshot) => assert_eq!(snapshot.len(), 2),
            other => panic!("expected Updated, got {other:?}"),
        }
        let (cached, token) = store.load(&origin.channel()).expect("cache written");
        assert_eq!(cached.len(), 2);
        assert_eq!(token.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    /// What: A held snapshot plus a 304 yields `NotModified`.
    async fn held_snapshot_not_modified() {
        let origin = serve(|_, _| response("304 Not Modified", &[], b"")).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let token = FreshnessToken {
            etag: Some("\"v1\"".into()),
            last_modified: None,
        };
        let completion = run_refresh(
            request(&origin.channel(), 2, Some(token)),
            &fetcher(),
            &CacheStore::new(dir.path()),
        )
        .await;
        assert!(matches!(completion.outcome, RefreshOutcome::NotModified));
    }

    #[tokio::test]
    /// What: On startup the cache validators are sent and a 304 reuses the cached snapshot.
    async fn startup_uses_cache_when_origin_unchanged() {
        let origin = serve(|head, _| {
            if head.contains("if-none-match: \"v1\"") {
                response("304 Not Modified", &[], b"")
            } else {
                response("500 Internal Server Error", &[], b"")
            }
        })
        .await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let token = FreshnessToken {
            etag: Some("\"v1\"".into()),
            last_modified: None,
        };
        store
            .save(&origin.channel(), &repodata(&[("zlib", "1.3")]), &token)
            .expect("seed cache");
        let completion = run_refresh(request(&origin.channel(), 1, None), &fetcher(), &store).await;
        match completion.outcome {
            RefreshOutcome::Updated(snapshot) => assert_eq!(snapshot.records[0].name, "zlib"),
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[tokio::test]
    /// What: A failing origin falls back to the cache, or fails without one.
    async fn failure_falls_back_to_cache() {
        let origin = serve(|_, _| response("503 Service Unavailable", &[], b"")).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());

        let empty = run_refresh(request(&origin.channel(), 1, None), &fetcher(), &store).await;
        assert!(matches!(empty.outcome, RefreshOutcome::Failed(_)));

        store
            .save(&origin.channel(), &repodata(&[("zlib", "1.3")]), &FreshnessToken::default())
            .expect("seed cache");
        let restored = run_refresh(request(&origin.channel(), 2, None), &fetcher(), &store).await;
        match restored.outcome {
            RefreshOutcome::Restored { snapshot, reason } => {
                assert_eq!(snapshot.len(), 1);
                assert!(reason.contains("503"), "{reason}");
            }
            other => panic!("expected Restored, got {other:?}"),
        }
    }

    #[tokio::test]
    /// What: An undecodable document never overwrites a good cache entry.
    async fn undecodable_document_keeps_cache() {
        let origin = serve(|_, _| response("200 OK", &[], b"<html>maintenance</html>")).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        store
            .save(&origin.channel(), &repodata(&[("zlib", "1.3")]), &FreshnessToken::default())
            .expect("seed cache");
        let completion = run_refresh(request(&origin.channel(), 1, None), &fetcher(), &store).await;
        assert!(matches!(completion.outcome, RefreshOutcome::Restored { .. }));
        assert!(store.load(&origin.channel()).is_some());
    }

    #[tokio::test]
    /// What: A refresh finishing after a later one never replaces the later cache bytes.
    ///
    /// - Input: Cache entry stored by a request at t=50; a refresh requested at t=10 completes
    /// - Output: The completion is still `Updated`, the cache keeps the t=50 document
    async fn late_refresh_does_not_overwrite_newer_cache() {
        let body = repodata(&[("numpy", "1.0")]);
        let origin = serve(move |_, _| response("200 OK", &[("ETag", "\"old\"")], &body)).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let newer = FreshnessToken {
            etag: Some("\"new\"".into()),
            last_modified: None,
        };
        store
            .save_if_newer(&origin.channel(), &repodata(&[("numpy", "2.0")]), &newer, 50)
            .expect("seed cache");
        let held = FreshnessToken {
            etag: Some("\"held\"".into()),
            last_modified: None,
        };
        let completion =
            run_refresh(request(&origin.channel(), 10, Some(held)), &fetcher(), &store).await;
        assert!(matches!(completion.outcome, RefreshOutcome::Updated(_)));
        let (cached, token) = store.load(&origin.channel()).expect("cache kept");
        assert_eq!(cached.records[0].version.as_str(), "2.0");
        assert_eq!(token, newer);
    }

    #[tokio::test]
    /// What: The worker answers every request with a completion carrying its generation.
    async fn worker_reports_each_request() {
        let body = repodata(&[("numpy", "1.26.0")]);
        let origin = serve(move |_, _| response("200 OK", &[], &body)).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let worker = spawn_refresh_worker(req_rx, done_tx, fetcher(), CacheStore::new(dir.path()));
        req_tx.send(request(&origin.channel(), 1, None)).expect("send");
        req_tx.send(request(&origin.channel(), 2, None)).expect("send");
        let mut generations = vec![
            done_rx.recv().await.expect("completion").generation,
            done_rx.recv().await.expect("completion").generation,
        ];
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2]);
        drop(req_tx);
        worker.await.expect("worker exits");
    }
}
