//! Channel references and conda platform (subdir) handling.

use std::fmt;

/// Every platform subdirectory a conda channel may publish.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "noarch",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64le",
    "linux-s390x",
    "linux-riscv64",
    "osx-64",
    "osx-arm64",
    "win-32",
    "win-64",
    "win-arm64",
    "emscripten-wasm32",
    "wasi-wasm32",
    "zos-z",
];

/// Default prefix for channels given by bare name.
pub const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org";

/// What: Immutable identifier of one channel partition (base URL + platform subdir).
///
/// Details:
/// - Built once from configuration and never mutated; cheap to clone and used
///   as a map key throughout the session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelReference {
    /// Channel root without trailing slash, e.g. `https://conda.anaconda.org/conda-forge`.
    base_url: String,
    /// Platform subdirectory, e.g. `linux-64` or `noarch`.
    subdir: String,
}

impl ChannelReference {
    /// Build a reference from a base URL and platform subdir.
    #[must_use]
    pub fn new(base_url: impl Into<String>, subdir: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            base_url,
            subdir: subdir.into().trim().to_string(),
        }
    }

    /// Channel root URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Platform subdirectory.
    #[must_use]
    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    /// What: URL of an index document inside this channel partition.
    ///
    /// Inputs:
    /// - `file_name`: Document name such as `repodata.json.zst`.
    ///
    /// Output:
    /// - `<base_url>/<subdir>/<file_name>`.
    #[must_use]
    pub fn document_url(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.subdir, file_name)
    }

    /// What: Short human label, e.g. `conda-forge/linux-64`.
    ///
    /// Details:
    /// - Uses the last path segment of the base URL so long mirrors stay readable.
    #[must_use]
    pub fn short_name(&self) -> String {
        let name = self
            .base_url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.base_url);
        format!("{name}/{}", self.subdir)
    }
}

impl fmt::Display for ChannelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_url, self.subdir)
    }
}

/// What: Resolve a channel given by name or URL into its base URL.
///
/// Inputs:
/// - `channel`: Bare name (`conda-forge`) or full URL.
/// - `alias`: Prefix used for bare names.
///
/// Output:
/// - Base URL without trailing slash.
#[must_use]
pub fn resolve_channel_url(channel: &str, alias: &str) -> String {
    let channel = channel.trim().trim_end_matches('/');
    if channel.contains("://") {
        channel.to_string()
    } else {
        format!("{}/{}", alias.trim().trim_end_matches('/'), channel)
    }
}

/// What: Expand channels over platforms into an ordered, de-duplicated reference list.
///
/// Inputs:
/// - `channels`: Channel names or URLs in priority order.
/// - `platforms`: Platform subdirs to browse.
/// - `alias`: Prefix for bare channel names.
///
/// Output:
/// - One `ChannelReference` per (channel, platform) pair, first occurrence wins.
#[must_use]
pub fn expand_channels(channels: &[String], platforms: &[String], alias: &str) -> Vec<ChannelReference> {
    let mut out: Vec<ChannelReference> = Vec::new();
    for channel in channels.iter().filter(|c| !c.trim().is_empty()) {
        let base = resolve_channel_url(channel, alias);
        for platform in sorted_platforms(platforms) {
            let reference = ChannelReference::new(base.clone(), platform);
            if !out.contains(&reference) {
                out.push(reference);
            }
        }
    }
    out
}

/// Whether `name` is a platform subdir conda knows about.
#[must_use]
pub fn is_known_platform(name: &str) -> bool {
    KNOWN_PLATFORMS.contains(&name)
}

/// What: Platform subdir of the running machine, when conda publishes one for it.
///
/// Output:
/// - `Some("linux-64")` etc., or `None` on targets conda has no subdir for.
#[must_use]
pub const fn current_platform() -> Option<&'static str> {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Some("linux-64")
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        Some("linux-aarch64")
    } else if cfg!(all(target_os = "linux", target_arch = "powerpc64")) {
        Some("linux-ppc64le")
    } else if cfg!(all(target_os = "linux", target_arch = "s390x")) {
        Some("linux-s390x")
    } else if cfg!(all(target_os = "linux", target_arch = "x86")) {
        Some("linux-32")
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        Some("osx-64")
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Some("osx-arm64")
    } else if cfg!(all(target_os = "windows", target_arch = "x86_64")) {
        Some("win-64")
    } else if cfg!(all(target_os = "windows", target_arch = "aarch64")) {
        Some("win-arm64")
    } else {
        None
    }
}

/// What: Default platform selection: the current platform plus `noarch`.
///
/// Output:
/// - `["linux-64", "noarch"]` on x86-64 Linux, `["noarch"]` on unknown targets.
#[must_use]
pub fn default_platforms() -> Vec<String> {
    let mut out = Vec::with_capacity(2);
    if let Some(p) = current_platform() {
        out.push(p.to_string());
    }
    out.push("noarch".to_string());
    out
}

/// What: Sort platforms alphabetically with `noarch` last, removing duplicates.
#[must_use]
pub fn sorted_platforms(platforms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = platforms
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    out.sort_by(|a, b| (a == "noarch", a.as_str()).cmp(&(b == "noarch", b.as_str())));
    out.dedup();
    out
}
