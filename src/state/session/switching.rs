//! Runtime reconfiguration: the platform selector and the channel editor.
//!
//! Both end in [`Session::replace_channels`], which swaps the configured
//! channel list and refreshes it. Snapshots of channels that survive the swap
//! are kept; when the new list starts from nothing the old configuration is
//! remembered and restored if every new channel fails.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{info, warn};

use super::Session;
use crate::index::{
    ChannelReference, IndexSnapshot, JobRequest, current_platform, expand_channels,
    sorted_platforms,
};
use crate::state::types::{InputMode, NoticeLevel, PlatformPicker, SessionState};

/// Configuration held while a switch that started from nothing is loading.
pub(super) struct PendingSwitch {
    channels: Vec<ChannelReference>,
    snapshots: HashMap<ChannelReference, Arc<IndexSnapshot>>,
    applied: HashMap<ChannelReference, u64>,
    label: String,
}

impl Session {
    /// Distinct channel roots in configuration order.
    #[must_use]
    pub fn base_urls(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for channel in &self.channels {
            if !out.iter().any(|b| b == channel.base_url()) {
                out.push(channel.base_url().to_string());
            }
        }
        out
    }

    /// Selected platform subdirs, `noarch` last.
    #[must_use]
    pub fn platforms(&self) -> Vec<String> {
        let subdirs: Vec<String> = self.channels.iter().map(|c| c.subdir().to_string()).collect();
        sorted_platforms(&subdirs)
    }

    /// Open platform selector, if any.
    #[must_use]
    pub const fn picker(&self) -> Option<&PlatformPicker> {
        self.picker.as_ref()
    }

    /// Channel text being edited.
    #[must_use]
    pub fn channel_draft(&self) -> &str {
        &self.channel_draft
    }

    /// What: Swap the configured channels and refresh them.
    ///
    /// Inputs:
    /// - `channels`: New channel partitions.
    /// - `label`: Human description used in notices, e.g. `channel bioconda`.
    ///
    /// Details:
    /// - Snapshots, applied generations and in-flight requests of partitions
    ///   that stay configured are kept; the rest are forgotten and late
    ///   completions for them are dropped.
    /// - When nothing survives, the previous configuration is remembered so it
    ///   can be restored if the new channels all fail.
    pub fn replace_channels(&mut self, channels: Vec<ChannelReference>, label: String) {
        if self.state == SessionState::Shutdown || channels.is_empty() {
            return;
        }
        info!(label = %label, partitions = channels.len(), "switching channels");
        let keep: BTreeSet<&ChannelReference> = channels.iter().collect();
        let survives = self.snapshots.keys().any(|c| keep.contains(c));
        if let Some(pending) = self.pending_switch.as_mut() {
            pending.label.clone_from(&label);
        } else if !survives && !self.snapshots.is_empty() {
            self.pending_switch = Some(PendingSwitch {
                channels: self.channels.clone(),
                snapshots: self.snapshots.clone(),
                applied: self.applied.clone(),
                label,
            });
        }
        self.snapshots.retain(|c, _| keep.contains(c));
        self.applied.retain(|c, _| keep.contains(c));
        self.in_flight.retain(|_, c| keep.contains(&*c));
        self.channels = channels;
        self.failures.clear();
        self.rebuild_index();
        if self.snapshots.is_empty() {
            self.transition(SessionState::Loading);
        }
        self.request_refresh();
    }

    /// What: Resolve a pending switch once it succeeded or ran out of requests.
    ///
    /// Details:
    /// - Any held snapshot means the new configuration loaded.
    /// - Nothing held and nothing in flight restores the remembered configuration.
    pub(super) fn finish_switch(&mut self) {
        if self.pending_switch.is_none() {
            return;
        }
        if !self.snapshots.is_empty() {
            if let Some(pending) = self.pending_switch.take() {
                info!(label = %pending.label, "channel switch loaded");
                self.set_notice(format!("switched to {}", pending.label), NoticeLevel::Info);
            }
            return;
        }
        if !self.in_flight.is_empty() {
            return;
        }
        let Some(pending) = self.pending_switch.take() else {
            return;
        };
        warn!(label = %pending.label, "channel switch failed, restoring previous channels");
        self.channels = pending.channels;
        self.snapshots = pending.snapshots;
        self.applied = pending.applied;
        self.failures.clear();
        self.rebuild_index();
        if matches!(self.state, SessionState::Loading | SessionState::Error(_)) {
            self.transition(SessionState::Browsing);
        }
        self.set_notice(
            format!("failed to load {}; restored previous channels", pending.label),
            NoticeLevel::Warning,
        );
    }

    /// What: Open the platform selector.
    ///
    /// Details:
    /// - Uses the last discovery result when it covers the same channel roots;
    ///   otherwise starts discovery and lists only the current selection until
    ///   it answers.
    pub fn open_platform_picker(&mut self) {
        let bases = self.base_urls();
        let selected = self.platforms();
        let cached = self
            .discovered
            .as_ref()
            .filter(|(checked, _)| *checked == bases)
            .map(|(_, platforms)| platforms.clone());
        let mut discovering = cached.is_none();
        let mut available = cached.unwrap_or_default();
        available.extend(selected.iter().cloned());
        if discovering
            && self
                .job_tx
                .send(JobRequest::DiscoverPlatforms { base_urls: bases })
                .is_err()
        {
            warn!("job worker is gone, platform discovery not started");
            self.set_notice("platform discovery is unavailable", NoticeLevel::Warning);
            discovering = false;
        }
        self.picker = Some(PlatformPicker {
            available: sorted_platforms(&available),
            draft: selected.into_iter().collect(),
            cursor: 0,
            discovering,
        });
        self.input_mode = InputMode::Platforms;
    }

    /// Move the selector highlight by `delta` rows.
    pub fn picker_move(&mut self, delta: isize) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        let max = picker.available.len().saturating_sub(1);
        picker.cursor = if delta < 0 {
            picker.cursor.saturating_sub(delta.unsigned_abs())
        } else {
            picker.cursor.saturating_add(delta.unsigned_abs()).min(max)
        };
    }

    /// What: Tick or untick the highlighted platform.
    ///
    /// Details:
    /// - The last ticked platform cannot be unticked.
    pub fn toggle_platform(&mut self) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        let Some(platform) = picker.highlighted().map(str::to_string) else {
            return;
        };
        if picker.draft.contains(&platform) {
            if picker.draft.len() == 1 {
                self.set_notice("at least one platform must remain selected", NoticeLevel::Warning);
                return;
            }
            picker.draft.remove(&platform);
        } else {
            picker.draft.insert(platform);
        }
    }

    /// What: Tick every listed platform, or go back to the defaults when all are ticked.
    ///
    /// Details:
    /// - Defaults are the running machine's platform plus `noarch`, limited to
    ///   what is listed; `noarch` alone, or the first entry, when neither is listed.
    pub fn toggle_all_platforms(&mut self) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        if picker.available.is_empty() {
            return;
        }
        let all_selected = picker.available.iter().all(|p| picker.draft.contains(p));
        picker.draft = if all_selected {
            let listed = |p: &str| picker.available.iter().any(|a| a == p);
            let mut defaults: BTreeSet<String> = current_platform()
                .into_iter()
                .chain(["noarch"])
                .filter(|p| listed(*p))
                .map(str::to_string)
                .collect();
            if defaults.is_empty() {
                defaults.extend(picker.available.first().cloned());
            }
            defaults
        } else {
            picker.available.iter().cloned().collect()
        };
    }

    /// What: Apply the ticked platforms.
    ///
    /// Output:
    /// - `true` when the selector closed.
    ///
    /// Details:
    /// - An unchanged selection just closes the selector.
    /// - Otherwise every channel root is expanded over the ticked platforms
    ///   and the new list is loaded through [`Session::replace_channels`].
    pub fn apply_platform_selection(&mut self) -> bool {
        let Some(picker) = self.picker.as_ref() else {
            return false;
        };
        if picker.draft.is_empty() {
            self.set_notice("select at least one platform before applying", NoticeLevel::Warning);
            return false;
        }
        let platforms: Vec<String> = sorted_platforms(&picker.draft.iter().cloned().collect::<Vec<_>>());
        self.picker = None;
        self.input_mode = InputMode::Normal;
        if platforms == self.platforms() {
            return true;
        }
        let channels = expand_channels(&self.base_urls(), &platforms, &self.channel_alias);
        let label = format!("platforms {}", platforms.join(", "));
        self.set_notice(format!("loading {label}..."), NoticeLevel::Info);
        self.replace_channels(channels, label);
        true
    }

    /// Close the selector without changing anything.
    pub fn cancel_picker(&mut self) {
        self.picker = None;
        self.input_mode = InputMode::Normal;
    }

    /// What: Take a discovery result.
    ///
    /// Inputs:
    /// - `base_urls`: Channel roots that were checked.
    /// - `platforms`: Subdirs they publish.
    ///
    /// Details:
    /// - Results for roots that are no longer configured are dropped.
    /// - The current selection always stays listed so it can be unticked.
    pub(super) fn platforms_discovered(&mut self, base_urls: Vec<String>, platforms: Vec<String>) {
        if base_urls != self.base_urls() {
            info!("dropping platform discovery for previous channels");
            return;
        }
        if platforms.is_empty() {
            self.set_notice("no platforms found for the current channels", NoticeLevel::Warning);
        }
        let mut listed = platforms.clone();
        listed.extend(self.platforms());
        self.discovered = Some((base_urls, platforms));
        if let Some(picker) = self.picker.as_mut() {
            picker.available = sorted_platforms(&listed);
            picker.discovering = false;
            picker.cursor = picker.cursor.min(picker.available.len().saturating_sub(1));
        }
    }

    /// What: Start editing the channel list.
    ///
    /// Details:
    /// - Channels under the configured alias are shown by bare name, others by URL.
    pub fn open_channel_edit(&mut self) {
        let prefix = format!("{}/", self.channel_alias.trim().trim_end_matches('/'));
        self.channel_draft = self
            .base_urls()
            .iter()
            .map(|b| b.strip_prefix(&prefix).unwrap_or(b).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.input_mode = InputMode::Channel;
    }

    /// Append a character to the channel draft.
    pub fn channel_push_char(&mut self, c: char) {
        self.channel_draft.push(c);
    }

    /// Remove the last character of the channel draft.
    pub fn channel_backspace(&mut self) {
        self.channel_draft.pop();
    }

    /// Clear the channel draft.
    pub fn clear_channel_draft(&mut self) {
        self.channel_draft.clear();
    }

    /// Leave the channel editor without changing anything.
    pub fn cancel_channel_edit(&mut self) {
        self.channel_draft.clear();
        self.input_mode = InputMode::Normal;
    }

    /// What: Switch to the channels typed into the editor.
    ///
    /// Output:
    /// - `true` when the editor closed.
    ///
    /// Details:
    /// - Comma or whitespace separated names or URLs, expanded over the
    ///   selected platforms.
    /// - An empty draft is refused; an unchanged list just closes the editor.
    pub fn confirm_channel_edit(&mut self) -> bool {
        let names: Vec<String> = self
            .channel_draft
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            self.set_notice("channel cannot be empty", NoticeLevel::Warning);
            return false;
        }
        let channels = expand_channels(&names, &self.platforms(), &self.channel_alias);
        self.channel_draft.clear();
        self.input_mode = InputMode::Normal;
        if channels == self.channels {
            return true;
        }
        let label = format!("channel {}", names.join(", "));
        self.set_notice(format!("loading {label}..."), NoticeLevel::Info);
        self.replace_channels(channels, label);
        true
    }
}
