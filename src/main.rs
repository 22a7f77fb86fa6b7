//! pixi-browse binary entrypoint kept minimal. The runtime lives in `pixi_browse::app`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::OnceLock;
use std::{fmt, time::SystemTime};

use clap::Parser;

use pixi_browse::app::{self, RunOptions};
use pixi_browse::args::{Args, apply_args, determine_log_level, startup_plan};
use pixi_browse::config;

/// Log timestamps as `YYYY-MM-DD-T HH:MM:SS` (UTC).
struct BrowseTimer;

impl tracing_subscriber::fmt::time::FormatTime for BrowseTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let secs = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        let s = pixi_browse::util::ts_to_date(Some(secs)); // "YYYY-MM-DD HH:MM:SS"
        let ts = s.replacen(' ', "-T", 1); // "YYYY-MM-DD-T HH:MM:SS"
        w.write_str(&ts)
    }
}

/// Keeps the non-blocking log writer flushing until exit.
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install the file logger under `<config>/logs`, falling back to stderr.
fn init_logging(level: &str) {
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    let mut log_path = config::logs_dir();
    log_path.push("pixi-browse.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_timer(BrowseTimer)
                .init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            // Fallback: stderr logger so startup is never blocked
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .with_timer(BrowseTimer)
                .init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&determine_log_level(&args));

    let mut settings = config::load_settings();
    if let Err(e) = apply_args(&args, &mut settings) {
        eprintln!("pixi-browse: {e}");
        return ExitCode::FAILURE;
    }
    let (channels, query) = startup_plan(&args, &settings);
    if channels.is_empty() {
        eprintln!("pixi-browse: no channels configured");
        return ExitCode::FAILURE;
    }
    let options = RunOptions {
        network: settings.network.clone(),
        cache_root: config::repodata_cache_dir(settings.cache_dir.as_deref()),
        use_cache: !args.no_cache,
        refresh_interval: settings.refresh_interval,
        channel_alias: settings.channel_alias.clone(),
        download_dir: settings
            .download_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    tracing::info!(
        channels = channels.len(),
        print = args.print,
        use_cache = options.use_cache,
        "pixi-browse starting"
    );

    let outcome = if args.print {
        let mut stdout = std::io::stdout().lock();
        app::run_print(channels, query, options, &mut stdout).await
    } else {
        app::run(channels, query, options).await
    };
    let code = match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("pixi-browse: no channel index could be loaded");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = ?err, "application error");
            eprintln!("pixi-browse: {err}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("pixi-browse exited");
    code
}

#[cfg(test)]
mod tests {
    /// What: `FormatTime` impl writes a non-empty timestamp without panicking
    ///
    /// - Input: Tracing writer buffer
    /// - Output: Buffer receives some content
    #[test]
    fn browse_timer_formats_time_without_panic() {
        use tracing_subscriber::fmt::time::FormatTime;
        let mut buf = String::new();
        let mut writer = tracing_subscriber::fmt::format::Writer::new(&mut buf);
        let t = super::BrowseTimer;
        let _ = t.format_time(&mut writer);
        assert!(!buf.is_empty());
        assert!(buf.contains("-T"));
    }
}
