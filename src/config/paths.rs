use std::env;
use std::path::{Path, PathBuf};

/// Directory name used under the config and cache roots.
const APP_DIR: &str = "pixi-browse";

/// Determine the settings file path, searching `$HOME/.config` then `XDG_CONFIG_HOME`.
///
/// Output: The first `settings.conf` that exists, or `None`.
pub fn resolve_settings_config_path() -> Option<PathBuf> {
    let home = env::var("HOME").ok();
    let xdg_config = env::var("XDG_CONFIG_HOME").ok();
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(h) = home.as_deref() {
        candidates.push(Path::new(h).join(".config").join(APP_DIR).join("settings.conf"));
    }
    if let Some(xdg) = xdg_config.as_deref() {
        candidates.push(Path::new(xdg).join(APP_DIR).join("settings.conf"));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// What: Resolve an XDG base directory from its variable or fall back to `$HOME` + segments.
///
/// Inputs:
/// - `var_value`: Value of the XDG variable, if set.
/// - `home`: Value of `$HOME`, if set.
/// - `home_default`: Path segments relative to `$HOME` used when the variable is unset or blank.
///
/// Output: Resolved base directory; `.` stands in for a missing `$HOME`.
fn xdg_base_dir(var_value: Option<String>, home: Option<String>, home_default: &[&str]) -> PathBuf {
    if let Some(p) = var_value
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    let mut base = PathBuf::from(home.unwrap_or_else(|| ".".to_string()));
    for seg in home_default {
        base = base.join(seg);
    }
    base
}

/// Config directory: `$HOME/.config/pixi-browse`, else under `XDG_CONFIG_HOME` (ensured to exist).
pub fn config_dir() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        let dir = Path::new(&home).join(".config").join(APP_DIR);
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir;
        }
    }
    let base = xdg_base_dir(
        env::var("XDG_CONFIG_HOME").ok(),
        env::var("HOME").ok(),
        &[".config"],
    );
    let dir = base.join(APP_DIR);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Logs directory under config: `<config>/logs` (ensured to exist).
pub fn logs_dir() -> PathBuf {
    let dir = config_dir().join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// What: Root of the repodata cache.
///
/// Inputs:
/// - `override_dir`: `cache_dir` from the settings, if configured.
///
/// Output:
/// - `override_dir` as is, or `XDG_CACHE_HOME/pixi-browse/repodata`
///   (default `$HOME/.cache/pixi-browse/repodata`).
///
/// Details:
/// - The directory is not created here; the cache store creates it on first save.
pub fn repodata_cache_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    xdg_base_dir(
        env::var("XDG_CACHE_HOME").ok(),
        env::var("HOME").ok(),
        &[".cache"],
    )
    .join(APP_DIR)
    .join("repodata")
}
