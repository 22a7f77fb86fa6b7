//! Application runtime: the interactive TUI loop and the one-shot print mode.

use std::path::PathBuf;
use std::time::Duration;

use crate::index::{CacheStore, IndexFetcher, NetworkSettings};

/// One-shot print mode.
mod print;
/// Runtime event loop and background workers.
mod runtime;
/// Terminal setup and restoration utilities.
mod terminal;

pub use print::run_print;
pub use runtime::run;

/// Error type of the runtime plumbing.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// What: Everything the runtime needs besides the channels and the initial query.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// HTTP behaviour of the fetcher.
    pub network: NetworkSettings,
    /// Root directory of the repodata cache.
    pub cache_root: PathBuf,
    /// Whether the cache may be read and written.
    pub use_cache: bool,
    /// Automatic refresh period.
    pub refresh_interval: Option<Duration>,
    /// Prefix for bare channel names typed at runtime.
    pub channel_alias: String,
    /// Directory downloaded artifacts are saved to.
    pub download_dir: PathBuf,
}

impl RunOptions {
    /// Build the shared fetcher and cache store.
    fn backends(&self) -> Result<(IndexFetcher, CacheStore)> {
        let fetcher = IndexFetcher::new(self.network.clone())?;
        Ok((fetcher, CacheStore::new(self.cache_root.clone())))
    }
}
