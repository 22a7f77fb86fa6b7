//! Session state machine.
//!
//! The session owns the live [`PackageIndex`] and the current [`ResultPage`].
//! It is only ever touched by the event loop: keystrokes call its methods
//! directly, background refreshes reach it as [`RefreshCompletion`] values.
//!
//! Refresh ordering: every request gets a generation number when it starts.
//! A completion is applied unless a later generation for the same channel was
//! already applied, in which case it is dropped. In-flight requests are never
//! cancelled; completions for channels no longer configured are ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::index::{
    ChannelReference, Cursor, DEFAULT_CHANNEL_ALIAS, IndexSnapshot, JobCompletion, JobRequest,
    PackageIndex, PackageRecord, QueryError, QuerySpec, RefreshCompletion, RefreshOutcome,
    RefreshRequest, ResultPage, execute, sorted_platforms,
};
use crate::state::types::{
    ChannelStatus, InputMode, Notice, NoticeLevel, PlatformPicker, SessionState,
};

mod detail;
mod switching;

use switching::PendingSwitch;

/// What: A new session plus the receiving ends of its background requests.
///
/// Details:
/// - The runtime hands `requests` to the refresh worker and `jobs` to the job
///   worker; tests read them directly.
pub struct SessionHandle {
    /// The state machine.
    pub session: Session,
    /// Refresh requests issued by the session.
    pub requests: mpsc::UnboundedReceiver<RefreshRequest>,
    /// Discovery and download jobs issued by the session.
    pub jobs: mpsc::UnboundedReceiver<JobRequest>,
}

/// What: Create a session over `channels` with an initial query.
///
/// Inputs:
/// - `channels`: Channel partitions in priority order.
/// - `initial_query`: Filter text and page size to start with.
///
/// Output:
/// - `SessionHandle` in `Loading` state; call [`Session::start`] to issue the first fetches.
#[must_use]
pub fn new_session(channels: Vec<ChannelReference>, initial_query: QuerySpec) -> SessionHandle {
    let (refresh_tx, requests) = mpsc::unbounded_channel();
    let (job_tx, jobs) = mpsc::unbounded_channel();
    let index = PackageIndex::default();
    let query = QuerySpec {
        cursor: None,
        ..initial_query
    };
    let query_error = crate::index::validate(&query.text).err();
    let page = ResultPage::empty(index.id());
    SessionHandle {
        session: Session {
            channels,
            state: SessionState::Loading,
            snapshots: HashMap::new(),
            applied: HashMap::new(),
            in_flight: BTreeMap::new(),
            next_generation: 1,
            index,
            query,
            page,
            selected: 0,
            input_mode: InputMode::Normal,
            notice: None,
            query_error,
            failures: Vec::new(),
            use_cache: true,
            refresh_interval: None,
            last_refresh_at: None,
            had_snapshot: false,
            load_failed: false,
            channel_alias: DEFAULT_CHANNEL_ALIAS.to_string(),
            picker: None,
            discovered: None,
            channel_draft: String::new(),
            pending_switch: None,
            version_cursor: 0,
            collapsed: BTreeSet::new(),
            download: None,
            download_dir: PathBuf::from("."),
            refresh_tx,
            job_tx,
        },
        requests,
        jobs,
    }
}

/// What: State machine behind one interactive browse session.
pub struct Session {
    /// Channel partitions in priority order.
    channels: Vec<ChannelReference>,
    /// Current lifecycle state.
    state: SessionState,
    /// Held snapshot per channel.
    snapshots: HashMap<ChannelReference, Arc<IndexSnapshot>>,
    /// Highest applied refresh generation per channel.
    applied: HashMap<ChannelReference, u64>,
    /// Generations started but not completed, with their channel.
    in_flight: BTreeMap<u64, ChannelReference>,
    /// Next generation to hand out.
    next_generation: u64,
    /// Searchable union of all held snapshots.
    index: PackageIndex,
    /// Current filter text, page size and position.
    query: QuerySpec,
    /// Page currently displayed.
    page: ResultPage,
    /// Highlighted row within `page`.
    selected: usize,
    /// Whether keys edit the filter.
    input_mode: InputMode,
    /// Transient message.
    notice: Option<Notice>,
    /// Problem with the current filter text, shown next to it.
    query_error: Option<QueryError>,
    /// Reasons of failed refreshes since the last successful one, for the error view.
    failures: Vec<String>,
    /// Whether refreshes may use the on-disk cache.
    use_cache: bool,
    /// Automatic refresh period.
    refresh_interval: Option<Duration>,
    /// When the last refresh round started.
    last_refresh_at: Option<Instant>,
    /// Whether any snapshot was ever applied.
    had_snapshot: bool,
    /// Whether the session reached `Error` and has held nothing since.
    load_failed: bool,
    /// Prefix bare channel names resolve against when switching channels.
    channel_alias: String,
    /// Open platform selector.
    picker: Option<PlatformPicker>,
    /// Last discovery result: the checked channel roots and the subdirs they publish.
    discovered: Option<(Vec<String>, Vec<String>)>,
    /// Channel text being edited.
    channel_draft: String,
    /// Configuration restored when a channel or platform switch loads nothing.
    pending_switch: Option<PendingSwitch>,
    /// Highlighted row of the detail view's version list.
    version_cursor: usize,
    /// Platform sections folded in the detail view.
    collapsed: BTreeSet<String>,
    /// File name of the artifact being downloaded.
    download: Option<String>,
    /// Directory artifacts are saved to.
    download_dir: PathBuf,
    /// Outgoing refresh requests.
    refresh_tx: mpsc::UnboundedSender<RefreshRequest>,
    /// Outgoing discovery and download jobs.
    job_tx: mpsc::UnboundedSender<JobRequest>,
}

impl Session {
    /// Allow or forbid the on-disk cache for all following refreshes.
    pub const fn set_use_cache(&mut self, use_cache: bool) {
        self.use_cache = use_cache;
    }

    /// Enable automatic refreshes every `interval`; `None` disables them.
    pub const fn set_refresh_interval(&mut self, interval: Option<Duration>) {
        self.refresh_interval = interval;
    }

    /// Prefix used for bare channel names typed into the channel editor.
    pub fn set_channel_alias(&mut self, alias: impl Into<String>) {
        self.channel_alias = alias.into();
    }

    /// Directory downloaded artifacts are written to.
    pub fn set_download_dir(&mut self, dir: impl Into<PathBuf>) {
        self.download_dir = dir.into();
    }

    /// Issue the initial fetch for every channel.
    pub fn start(&mut self) {
        info!(channels = self.channels.len(), "starting session");
        self.request_refresh();
    }

    /// What: Start a refresh of every channel.
    ///
    /// Output:
    /// - Number of requests issued.
    ///
    /// Details:
    /// - `Browsing` becomes `Refreshing`, `Error` goes back to `Loading`; other
    ///   states are kept. The displayed page does not change until completions arrive.
    pub fn request_refresh(&mut self) -> usize {
        if self.state == SessionState::Shutdown {
            return 0;
        }
        let mut issued = 0;
        let mut worker_gone = false;
        for channel in &self.channels {
            let generation = self.next_generation;
            self.next_generation += 1;
            let request = RefreshRequest {
                channel: channel.clone(),
                generation,
                known: self.snapshots.get(channel).map(|s| s.freshness.clone()),
                use_cache: self.use_cache,
                requested_at: chrono::Utc::now().timestamp_millis(),
            };
            if self.refresh_tx.send(request).is_err() {
                worker_gone = true;
                break;
            }
            self.in_flight.insert(generation, channel.clone());
            issued += 1;
        }
        self.last_refresh_at = Some(Instant::now());
        if worker_gone {
            warn!("refresh worker is gone, refresh not started");
            self.set_notice("refresh is unavailable", NoticeLevel::Warning);
        }
        if issued > 0 {
            let next = match &self.state {
                SessionState::Browsing => SessionState::Refreshing,
                SessionState::Error(_) => {
                    self.failures.clear();
                    SessionState::Loading
                }
                other => other.clone(),
            };
            self.transition(next);
        }
        debug!(issued, "refresh requested");
        issued
    }

    /// What: Apply one background completion.
    ///
    /// Inputs:
    /// - `completion`: Outcome of a refresh started by this session.
    ///
    /// Output:
    /// - `true` when the package index was rebuilt (and the page reset to the first page).
    ///
    /// Details:
    /// - Completions older than the last applied generation of their channel are dropped,
    ///   as are completions for channels a switch removed.
    /// - `NotModified` never rebuilds or touches the displayed page.
    /// - A failure keeps whatever snapshot is held and posts a notice.
    pub fn apply_refresh(&mut self, completion: RefreshCompletion) -> bool {
        let RefreshCompletion {
            channel,
            generation,
            outcome,
        } = completion;
        self.in_flight.remove(&generation);
        if self.state == SessionState::Shutdown {
            return false;
        }
        if !self.channels.contains(&channel) {
            debug!(channel = %channel, generation, "dropping completion for a removed channel");
            self.settle();
            return false;
        }
        if let Some(&applied) = self.applied.get(&channel)
            && generation < applied
        {
            debug!(channel = %channel, generation, applied, "dropping stale refresh completion");
            self.settle();
            return false;
        }
        let rebuilt = match outcome {
            RefreshOutcome::NotModified => {
                self.applied.insert(channel, generation);
                false
            }
            RefreshOutcome::Updated(snapshot) => {
                self.applied.insert(channel.clone(), generation);
                self.snapshots.insert(channel, snapshot);
                self.failures.clear();
                self.rebuild_index();
                self.finish_switch();
                true
            }
            RefreshOutcome::Restored { snapshot, reason } => {
                self.set_notice(
                    format!("{}: showing cached index ({reason})", channel.short_name()),
                    NoticeLevel::Warning,
                );
                if self.snapshots.contains_key(&channel) {
                    false
                } else {
                    self.applied.insert(channel.clone(), generation);
                    self.snapshots.insert(channel, snapshot);
                    self.rebuild_index();
                    self.finish_switch();
                    true
                }
            }
            RefreshOutcome::Failed(reason) => {
                self.set_notice(reason.clone(), NoticeLevel::Warning);
                self.failures.push(reason);
                false
            }
        };
        self.settle();
        rebuilt
    }

    /// Rebuild the index from every held snapshot and re-run the query from the first page.
    fn rebuild_index(&mut self) {
        let previous = self.selected_record().cloned();
        let records: Vec<Arc<PackageRecord>> = self
            .channels
            .iter()
            .filter_map(|c| self.snapshots.get(c))
            .flat_map(|s| s.records.iter().cloned())
            .collect();
        self.index.rebuild(records);
        if !self.snapshots.is_empty() {
            self.had_snapshot = true;
            self.load_failed = false;
        }
        info!(
            records = self.index.len(),
            names = self.index.name_count(),
            index = self.index.id().get(),
            "package index rebuilt"
        );
        if self.run_query(None) {
            self.selected = previous
                .and_then(|p| self.page.records.iter().position(|r| **r == *p))
                .unwrap_or(0);
        }
    }

    /// Derive the lifecycle state after a completion.
    fn settle(&mut self) {
        if self.state == SessionState::Shutdown {
            return;
        }
        if self.in_flight.is_empty() {
            self.finish_switch();
        }
        if matches!(self.state, SessionState::Detail(_)) {
            return;
        }
        let next = if !self.snapshots.is_empty() {
            if self.in_flight.is_empty() {
                SessionState::Browsing
            } else {
                SessionState::Refreshing
            }
        } else if self.in_flight.is_empty() {
            let message = if self.failures.is_empty() {
                "no channel produced a usable index".to_string()
            } else {
                self.failures.join("\n")
            };
            SessionState::Error(message)
        } else {
            SessionState::Loading
        };
        self.transition(next);
    }

    /// Move to `next`, logging real changes.
    fn transition(&mut self, next: SessionState) {
        if self.state.label() != next.label() {
            debug!(from = self.state.label(), to = next.label(), "session state change");
        }
        if matches!(next, SessionState::Error(_)) {
            self.load_failed = true;
        }
        self.state = next;
    }

    /// Execute the current filter at `cursor`; on error keep the page and record the error.
    fn run_query(&mut self, cursor: Option<Cursor>) -> bool {
        let spec = self.query.with_cursor(cursor);
        match execute(&spec, &self.index) {
            Ok(page) => {
                self.query = spec;
                self.page = page;
                self.query_error = None;
                true
            }
            Err(e) => {
                debug!(error = %e, "filter rejected");
                self.query_error = Some(e);
                false
            }
        }
    }

    /// Re-run the filter from the first page after an edit.
    fn refilter(&mut self) {
        if self.run_query(None) {
            self.selected = 0;
        }
    }

    /// Append a character to the filter text and re-run the query.
    pub fn push_char(&mut self, c: char) {
        self.query.text.push(c);
        self.refilter();
    }

    /// Remove the last character of the filter text and re-run the query.
    pub fn backspace(&mut self) {
        if self.query.text.pop().is_some() {
            self.refilter();
        }
    }

    /// Replace the filter text and re-run the query.
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.query.text = text.into();
        self.refilter();
    }

    /// Clear the filter text.
    pub fn clear_filter(&mut self) {
        if !self.query.text.is_empty() || self.query_error.is_some() {
            self.set_filter(String::new());
        }
    }

    /// Switch between navigation keys and filter editing.
    pub const fn set_input_mode(&mut self, mode: InputMode) {
        self.input_mode = mode;
    }

    /// What: Move the highlight by `delta` rows, clamped to the page.
    pub fn move_selection(&mut self, delta: isize) {
        let Some(max) = self.page.records.len().checked_sub(1) else {
            self.selected = 0;
            return;
        };
        self.selected = if delta < 0 {
            self.selected.saturating_sub(delta.unsigned_abs())
        } else {
            self.selected.saturating_add(delta.unsigned_abs()).min(max)
        };
    }

    /// Highlight the first row of the page.
    pub const fn select_first(&mut self) {
        self.selected = 0;
    }

    /// Highlight the last row of the page.
    pub fn select_last(&mut self) {
        self.selected = self.page.records.len().saturating_sub(1);
    }

    /// What: Show the following page.
    ///
    /// Output:
    /// - `true` if the page changed.
    pub fn next_page(&mut self) -> bool {
        let Some(cursor) = self.page.next_cursor else {
            return false;
        };
        let moved = self.run_query(Some(cursor));
        if moved {
            self.selected = 0;
        }
        moved
    }

    /// What: Show the preceding page.
    ///
    /// Output:
    /// - `true` if the page changed.
    pub fn prev_page(&mut self) -> bool {
        if self.page.offset == 0 {
            return false;
        }
        let cursor = Cursor {
            index: self.page.index_id,
            offset: self.page.offset.saturating_sub(self.query.page_size.max(1)),
        };
        let moved = self.run_query(Some(cursor));
        if moved {
            self.selected = 0;
        }
        moved
    }

    /// What: Open the detail view for the highlighted record.
    ///
    /// Output:
    /// - `true` if the view opened.
    pub fn open_detail(&mut self) -> bool {
        if !self.state.is_browsable() {
            return false;
        }
        let Some(record) = self.selected_record().cloned() else {
            return false;
        };
        self.collapsed.clear();
        self.transition(SessionState::Detail(Arc::clone(&record)));
        self.focus_version(&record);
        true
    }

    /// Leave the detail view.
    pub fn close_detail(&mut self) {
        if matches!(self.state, SessionState::Detail(_)) {
            let next = if self.in_flight.is_empty() {
                SessionState::Browsing
            } else {
                SessionState::Refreshing
            };
            self.transition(next);
        }
    }

    /// Enter the terminal `Shutdown` state.
    pub fn quit(&mut self) {
        info!("quit requested");
        self.transition(SessionState::Shutdown);
    }

    /// What: Time-driven housekeeping.
    ///
    /// Inputs:
    /// - `now`: Current instant.
    ///
    /// Output:
    /// - `true` when something visible changed.
    ///
    /// Details:
    /// - Drops an expired notice.
    /// - Starts a scheduled refresh when the interval elapsed and nothing is in flight.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
            changed = true;
        }
        if let Some(interval) = self.refresh_interval
            && self.state == SessionState::Browsing
            && self
                .last_refresh_at
                .is_none_or(|t| now.saturating_duration_since(t) >= interval)
        {
            info!(interval_secs = interval.as_secs(), "scheduled refresh");
            changed |= self.request_refresh() > 0;
        }
        changed
    }

    /// Post a transient notice.
    pub fn set_notice(&mut self, text: impl Into<String>, level: NoticeLevel) {
        self.notice = Some(Notice::new(text, level, Instant::now()));
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Page on screen.
    #[must_use]
    pub const fn page(&self) -> &ResultPage {
        &self.page
    }

    /// Highlighted row index.
    #[must_use]
    pub const fn selected(&self) -> usize {
        self.selected
    }

    /// Highlighted record, if the page is not empty.
    #[must_use]
    pub fn selected_record(&self) -> Option<&Arc<PackageRecord>> {
        self.page.records.get(self.selected)
    }

    /// Filter text as typed.
    #[must_use]
    pub fn filter_text(&self) -> &str {
        &self.query.text
    }

    /// Configured page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.query.page_size
    }

    /// Problem with the current filter text.
    #[must_use]
    pub const fn query_error(&self) -> Option<&QueryError> {
        self.query_error.as_ref()
    }

    /// Current input mode.
    #[must_use]
    pub const fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    /// Current notice, if any.
    #[must_use]
    pub const fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Live package index.
    #[must_use]
    pub const fn index(&self) -> &PackageIndex {
        &self.index
    }

    /// Number of refreshes in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether any snapshot was ever applied.
    #[must_use]
    pub const fn had_snapshot(&self) -> bool {
        self.had_snapshot
    }

    /// What: Whether loading failed for good; drives the process exit code.
    ///
    /// Output:
    /// - `true` once the session entered `Error` (every channel failed, nothing
    ///   cached) and no snapshot has been applied since. Quitting while still
    ///   `Loading` leaves it `false`.
    #[must_use]
    pub const fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// What: Apply one finished background job.
    ///
    /// Inputs:
    /// - `completion`: Discovery result or download outcome.
    ///
    /// Details:
    /// - Ignored after `Shutdown`.
    pub fn apply_job(&mut self, completion: JobCompletion) {
        if self.state == SessionState::Shutdown {
            return;
        }
        match completion {
            JobCompletion::Platforms {
                base_urls,
                platforms,
            } => self.platforms_discovered(base_urls, platforms),
            JobCompletion::Downloaded { file_name, result } => {
                self.download_finished(&file_name, result);
            }
        }
    }

    /// One status line per configured channel.
    #[must_use]
    pub fn channel_status(&self) -> Vec<ChannelStatus> {
        self.channels
            .iter()
            .map(|c| {
                let held = self.snapshots.get(c);
                ChannelStatus {
                    label: c.short_name(),
                    records: held.map(|s| s.len()),
                    fetched_at: held.map(|s| s.fetched_at),
                }
            })
            .collect()
    }

    /// What: Every version of `record`'s package, grouped by platform subdir.
    ///
    /// Output:
    /// - `(subdir, records)` pairs in platform order (`noarch` last), newest version first.
    #[must_use]
    pub fn versions_by_subdir(&self, record: &PackageRecord) -> Vec<(String, Vec<Arc<PackageRecord>>)> {
        let mut groups: BTreeMap<&str, Vec<Arc<PackageRecord>>> = BTreeMap::new();
        for r in self.index.versions_of(&record.name) {
            groups.entry(r.subdir.as_str()).or_default().push(Arc::clone(r));
        }
        let order: Vec<String> = groups.keys().map(|s| (*s).to_string()).collect();
        sorted_platforms(&order)
            .into_iter()
            .filter_map(|subdir| {
                let records = groups.remove(subdir.as_str())?;
                Some((subdir, records))
            })
            .collect()
    }
}
