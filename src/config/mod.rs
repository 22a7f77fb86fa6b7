//! Configuration: file locations and `settings.conf` parsing.

mod paths;
mod settings;

pub use paths::{config_dir, logs_dir, repodata_cache_dir, resolve_settings_config_path};
pub use settings::{DEFAULT_PAGE_SIZE, Settings, parse_settings};

use tracing::{info, warn};

/// What: Load settings from the first `settings.conf` found, or the defaults.
///
/// Output:
/// - Parsed `Settings`; an unreadable file logs a warning and yields the defaults.
#[must_use]
pub fn load_settings() -> Settings {
    let Some(path) = resolve_settings_config_path() else {
        return Settings::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            info!(path = %path.display(), "loaded settings");
            parse_settings(&content)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read settings; using defaults");
            Settings::default()
        }
    }
}
