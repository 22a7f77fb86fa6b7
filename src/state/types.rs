//! Value types shared by the session, the event handlers and the UI.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::index::PackageRecord;

/// How long a transient notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// What: Lifecycle state of an interactive session.
///
/// Details:
/// - `Shutdown` is terminal; every other state can be left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No snapshot yet; initial fetches in flight.
    Loading,
    /// A snapshot is present and no refresh is in flight.
    Browsing,
    /// Browsing while at least one background refresh is in flight.
    Refreshing,
    /// Expanded view of one record.
    Detail(Arc<PackageRecord>),
    /// Every fetch failed and nothing was cached.
    Error(String),
    /// Quit requested.
    Shutdown,
}

impl SessionState {
    /// Short label for the status line.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Browsing => "browsing",
            Self::Refreshing => "refreshing",
            Self::Detail(_) => "detail",
            Self::Error(_) => "error",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether a result list is on screen.
    #[must_use]
    pub const fn is_browsable(&self) -> bool {
        matches!(self, Self::Browsing | Self::Refreshing)
    }
}

/// Which widget receives plain character keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Keys are navigation commands.
    #[default]
    Normal,
    /// Keys edit the filter text.
    Filter,
    /// Keys drive the platform selector.
    Platforms,
    /// Keys edit the channel text.
    Channel,
}

/// What: Draft state of the platform selector.
///
/// Details:
/// - `draft` is applied only on confirmation; cancelling leaves the channels as they were.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformPicker {
    /// Selectable subdirs, `noarch` last.
    pub available: Vec<String>,
    /// Subdirs ticked so far.
    pub draft: BTreeSet<String>,
    /// Highlighted row of `available`.
    pub cursor: usize,
    /// Whether discovery is still running; `available` then holds only the current selection.
    pub discovering: bool,
}

impl PlatformPicker {
    /// Whether `platform` is ticked.
    #[must_use]
    pub fn is_selected(&self, platform: &str) -> bool {
        self.draft.contains(platform)
    }

    /// Subdir under the cursor.
    #[must_use]
    pub fn highlighted(&self) -> Option<&str> {
        self.available.get(self.cursor).map(String::as_str)
    }
}

/// One row of the detail view's version list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionRow {
    /// Header of one platform subdir.
    Section {
        /// Platform subdir.
        subdir: String,
        /// Records under it, folded or not.
        count: usize,
        /// Whether its entries are hidden.
        collapsed: bool,
    },
    /// One build of the package.
    Entry(Arc<PackageRecord>),
}

/// Severity of a transient notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something failed but browsing continues.
    Warning,
}

/// What: Transient message shown in the status area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Message text.
    pub text: String,
    /// Severity, drives the colour.
    pub level: NoticeLevel,
    /// When the notice disappears.
    pub expires_at: Instant,
}

impl Notice {
    /// Notice created at `now` that lives for [`NOTICE_TTL`].
    #[must_use]
    pub fn new(text: impl Into<String>, level: NoticeLevel, now: Instant) -> Self {
        Self {
            text: text.into(),
            level,
            expires_at: now + NOTICE_TTL,
        }
    }

    /// Whether the notice should be gone at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// What: Per-channel line for the status area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Short channel label, e.g. `conda-forge/noarch`.
    pub label: String,
    /// Record count of the held snapshot, `None` while nothing is held.
    pub records: Option<usize>,
    /// Unix seconds of the held snapshot's fetch.
    pub fetched_at: Option<i64>,
}
