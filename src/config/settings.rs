use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::index::{DEFAULT_CHANNEL_ALIAS, NetworkSettings, default_platforms};

/// Default number of records per result page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// What: User settings parsed from `settings.conf`.
///
/// Details:
/// - Read-only input to the session once startup is done; command-line values
///   are applied on top by the binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Channel names or URLs in priority order.
    pub channels: Vec<String>,
    /// Platform subdirs to load for every channel.
    pub platforms: Vec<String>,
    /// Base URL bare channel names resolve against.
    pub channel_alias: String,
    /// HTTP behaviour of the fetcher.
    pub network: NetworkSettings,
    /// Records per result page.
    pub page_size: usize,
    /// Automatic refresh period, `None` when disabled.
    pub refresh_interval: Option<Duration>,
    /// Cache root override.
    pub cache_dir: Option<PathBuf>,
    /// Where downloaded artifacts go; the working directory when unset.
    pub download_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channels: vec!["conda-forge".to_string()],
            platforms: default_platforms(),
            channel_alias: DEFAULT_CHANNEL_ALIAS.to_string(),
            network: NetworkSettings::default(),
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval: None,
            cache_dir: None,
            download_dir: None,
        }
    }
}

/// What: Remove a trailing `#` comment from a value.
///
/// Details:
/// - Only a `#` at the start or after whitespace opens a comment, so URL
///   fragments and `//` inside URLs survive.
fn strip_inline_comment(s: &str) -> &str {
    if s.starts_with('#') {
        return "";
    }
    let cut = s
        .char_indices()
        .zip(s.chars().skip(1))
        .find(|((_, c), next)| c.is_whitespace() && *next == '#')
        .map_or(s.len(), |((i, _), _)| i);
    s[..cut].trim()
}

/// Split a comma separated list, dropping blanks.
fn comma_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// What: Parse `settings.conf` content on top of the defaults.
///
/// Inputs:
/// - `content`: File content.
///
/// Output:
/// - `Settings` with every recognised, well-formed key applied.
///
/// Details:
/// - Blank lines and lines starting with `#` or `//` are skipped.
/// - Keys are lowercased with `.`, `-` and spaces mapped to `_`.
/// - Unknown keys and malformed values are ignored and logged at debug.
#[must_use]
pub fn parse_settings(content: &str) -> Settings {
    let mut settings = Settings::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        let Some((raw_key, raw_val)) = trimmed.split_once('=') else {
            continue;
        };
        let key = raw_key.trim().to_lowercase().replace(['.', '-', ' '], "_");
        let val = strip_inline_comment(raw_val.trim());
        if !apply_setting(&mut settings, &key, val) {
            debug!(key = %key, value = %val, "ignoring setting");
        }
    }
    settings
}

/// Apply one key; `false` when the key is unknown or the value malformed.
fn apply_setting(settings: &mut Settings, key: &str, val: &str) -> bool {
    match key {
        "channels" | "channel" => {
            let list = comma_list(val);
            if list.is_empty() {
                return false;
            }
            settings.channels = list;
        }
        "platforms" | "platform" | "subdirs" => {
            let list = comma_list(val);
            if list.is_empty() {
                return false;
            }
            settings.platforms = list;
        }
        "channel_alias" => {
            if val.is_empty() {
                return false;
            }
            settings.channel_alias = val.trim_end_matches('/').to_string();
        }
        "timeout_secs" => match val.parse::<u64>() {
            Ok(v) if v > 0 => settings.network.timeout = Duration::from_secs(v),
            _ => return false,
        },
        "connect_timeout_secs" => match val.parse::<u64>() {
            Ok(v) if v > 0 => settings.network.connect_timeout = Duration::from_secs(v),
            _ => return false,
        },
        "proxy" => {
            settings.network.proxy = (!val.is_empty()).then(|| val.to_string());
        }
        "max_retries" => match val.parse::<u32>() {
            Ok(v) => settings.network.max_retries = v,
            Err(_) => return false,
        },
        "retry_backoff_ms" => match val.parse::<u64>() {
            Ok(v) => settings.network.retry_backoff = Duration::from_millis(v),
            Err(_) => return false,
        },
        "page_size" => match val.parse::<usize>() {
            Ok(v) if v > 0 => settings.page_size = v,
            _ => return false,
        },
        "refresh_interval_mins" => match val.parse::<u64>() {
            Ok(0) => settings.refresh_interval = None,
            Ok(v) => settings.refresh_interval = Some(Duration::from_secs(v.saturating_mul(60))),
            Err(_) => return false,
        },
        "cache_dir" => {
            settings.cache_dir = (!val.is_empty()).then(|| PathBuf::from(val));
        }
        "download_dir" => {
            settings.download_dir = (!val.is_empty()).then(|| PathBuf::from(val));
        }
        _ => return false,
    }
    true
}
