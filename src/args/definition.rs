//! Command-line argument definition and processing.

use std::path::PathBuf;

use clap::Parser;

use crate::args::utils::parse_list;
use crate::config::Settings;
use crate::index::{ChannelReference, QuerySpec, expand_channels, is_known_platform};

/// pixi-browse - browse conda channel package indexes in the terminal
#[derive(Parser, Debug)]
#[command(name = "pixi-browse")]
#[command(version)]
#[command(about = "Browse conda channel package indexes in the terminal", long_about = None)]
pub struct Args {
    /// Channel name or URL to load; repeat or comma-separate for several (default: conda-forge)
    #[arg(short = 'c', long = "channel", value_name = "NAME")]
    pub channels: Vec<String>,

    /// Platform subdir to load, e.g. linux-64; repeat or comma-separate (default: current + noarch)
    #[arg(short = 'p', long = "platform", value_name = "SUBDIR")]
    pub platforms: Vec<String>,

    /// Initial filter text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Records per result page
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Directory downloaded artifacts are saved to (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Neither read nor write the on-disk index cache
    #[arg(long)]
    pub no_cache: bool,

    /// Load the channels, print the first result page and exit
    #[arg(long)]
    pub print: bool,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable verbose output (equivalent to --log-level debug)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Invalid combination of command-line values and settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    /// A platform name conda does not publish.
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
    /// `--page-size 0`.
    #[error("page size must be at least 1")]
    ZeroPageSize,
}

/// What: Apply command-line overrides to `settings` and validate the result.
///
/// Inputs:
/// - `args`: Parsed command-line arguments.
/// - `settings`: Settings loaded from `settings.conf`; updated in place.
///
/// Output:
/// - `Ok(())`, or the first invalid value.
///
/// Details:
/// - `--channel` and `--platform` replace the configured lists rather than extending them.
/// - `--download-dir` replaces the configured download directory.
/// - Platforms are checked after merging, so a bad `settings.conf` entry is reported too.
pub fn apply_args(args: &Args, settings: &mut Settings) -> Result<(), ArgsError> {
    let channels = parse_list(&args.channels);
    if !channels.is_empty() {
        settings.channels = channels;
    }
    let platforms = parse_list(&args.platforms);
    if !platforms.is_empty() {
        settings.platforms = platforms;
    }
    if let Some(dir) = &args.download_dir {
        settings.download_dir = Some(dir.clone());
    }
    if let Some(size) = args.page_size {
        if size == 0 {
            return Err(ArgsError::ZeroPageSize);
        }
        settings.page_size = size;
    }
    if let Some(bad) = settings.platforms.iter().find(|p| !is_known_platform(p)) {
        return Err(ArgsError::UnknownPlatform(bad.clone()));
    }
    Ok(())
}

/// What: Channel partitions and the initial query for a new session.
///
/// Inputs:
/// - `args`: Parsed command-line arguments (initial filter text).
/// - `settings`: Merged settings.
///
/// Output:
/// - One `ChannelReference` per (channel, platform) pair and the starting `QuerySpec`.
#[must_use]
pub fn startup_plan(args: &Args, settings: &Settings) -> (Vec<ChannelReference>, QuerySpec) {
    let channels = expand_channels(
        &settings.channels,
        &settings.platforms,
        &settings.channel_alias,
    );
    let query = QuerySpec::new(args.search.clone().unwrap_or_default(), settings.page_size);
    (channels, query)
}
