//! One-off background jobs started from the session: platform discovery and
//! artifact downloads.
//!
//! Like refreshes, jobs never touch session state; each answers with exactly
//! one [`JobCompletion`] delivered to the event loop.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{IndexFetcher, KNOWN_PLATFORMS, PackageRecord, sorted_platforms};

/// Index checks allowed in flight at once during discovery.
const CHECK_PARALLELISM: usize = 12;

/// What: Work the session hands to the job worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobRequest {
    /// Find which platform subdirs the channels publish.
    DiscoverPlatforms {
        /// Channel roots to check.
        base_urls: Vec<String>,
    },
    /// Save one artifact to disk.
    Download {
        /// Record whose artifact to fetch.
        record: Arc<PackageRecord>,
        /// Final file path.
        destination: PathBuf,
    },
}

/// What: Result of one job, as seen by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobCompletion {
    /// Discovery finished.
    Platforms {
        /// Channel roots that were checked, copied from the request.
        base_urls: Vec<String>,
        /// Subdirs published by at least one of them, `noarch` last.
        platforms: Vec<String>,
    },
    /// A download finished.
    Downloaded {
        /// Artifact file name.
        file_name: String,
        /// Final path, or why the download failed.
        result: Result<PathBuf, String>,
    },
}

/// What: Check every known subdir of every channel root for an index.
///
/// Inputs:
/// - `fetcher`: HTTP client.
/// - `base_urls`: Channel roots.
///
/// Output:
/// - Subdirs published by at least one root, sorted with `noarch` last.
///
/// Details:
/// - At most [`CHECK_PARALLELISM`] checks run concurrently.
pub async fn discover_platforms(fetcher: &IndexFetcher, base_urls: &[String]) -> Vec<String> {
    let permits = Arc::new(Semaphore::new(CHECK_PARALLELISM));
    let mut checks = JoinSet::new();
    for base in base_urls {
        for platform in KNOWN_PLATFORMS {
            let fetcher = fetcher.clone();
            let permits = Arc::clone(&permits);
            let base = base.clone();
            checks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                fetcher
                    .publishes(&base, platform)
                    .await
                    .then(|| (*platform).to_string())
            });
        }
    }
    let mut found = Vec::new();
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok(Some(platform)) => found.push(platform),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "platform check task failed"),
        }
    }
    let platforms = sorted_platforms(&found);
    info!(channels = base_urls.len(), platforms = platforms.len(), "platform discovery finished");
    platforms
}

/// What: Run one job to completion.
pub async fn run_job(job: JobRequest, fetcher: &IndexFetcher) -> JobCompletion {
    match job {
        JobRequest::DiscoverPlatforms { base_urls } => {
            let platforms = discover_platforms(fetcher, &base_urls).await;
            JobCompletion::Platforms {
                base_urls,
                platforms,
            }
        }
        JobRequest::Download {
            record,
            destination,
        } => {
            let result = match fetcher.download(&record, &destination).await {
                Ok(_) => Ok(destination),
                Err(e) => {
                    warn!(file = %record.file_name, error = %e, "download failed");
                    Err(e.to_string())
                }
            };
            JobCompletion::Downloaded {
                file_name: record.file_name.clone(),
                result,
            }
        }
    }
}

/// What: Spawn the worker that turns job requests into completion events.
///
/// Inputs:
/// - `jobs`: Requests from the session.
/// - `completions`: Sender for completion events to the event loop.
/// - `fetcher`: Shared HTTP client.
///
/// Details:
/// - Each job runs as its own task. The worker exits when the request channel closes.
pub fn spawn_job_worker(
    mut jobs: mpsc::UnboundedReceiver<JobRequest>,
    completions: mpsc::UnboundedSender<JobCompletion>,
    fetcher: IndexFetcher,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            debug!(job = ?job, "job requested");
            let fetcher = fetcher.clone();
            let completions = completions.clone();
            tokio::spawn(async move {
                let _ = completions.send(run_job(job, &fetcher).await);
            });
        }
        debug!("job worker stopped");
    })
}
