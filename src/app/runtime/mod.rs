use std::sync::atomic::Ordering;

use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::index::{ChannelReference, QuerySpec, spawn_job_worker, spawn_refresh_worker};
use crate::state::{SessionHandle, new_session};

use super::terminal::{restore_terminal, setup_terminal};
use super::{Result, RunOptions};

mod background;
mod channels;
mod event_loop;

use background::{spawn_event_thread, spawn_tick_worker};
use channels::Channels;
use event_loop::run_event_loop;

/// What: Run the interactive browser end-to-end.
///
/// Inputs:
/// - `channels`: Channel partitions in priority order.
/// - `query`: Initial filter text and page size.
/// - `options`: Network, cache, refresh and download settings.
///
/// Output:
/// - `Ok(false)` when the session ended in a load failure (every channel
///   failed, nothing cached), `Ok(true)` otherwise, including a quit while
///   still loading; `Err` on terminal or client setup failures.
///
/// Details:
/// - Spawns the refresh and job workers, the tick timer and the terminal
///   reader, then drives the event loop until the session reaches `Shutdown`.
/// - The terminal is restored even when the loop ends abnormally.
pub async fn run(
    channels: Vec<ChannelReference>,
    query: QuerySpec,
    options: RunOptions,
) -> Result<bool> {
    let (fetcher, store) = options.backends()?;
    let SessionHandle {
        mut session,
        requests,
        jobs,
    } = new_session(channels, query);
    session.set_use_cache(options.use_cache);
    session.set_refresh_interval(options.refresh_interval);
    session.set_channel_alias(options.channel_alias.clone());
    session.set_download_dir(options.download_dir.clone());

    let mut channels = Channels::new();
    spawn_job_worker(jobs, channels.job_tx.clone(), fetcher.clone());
    spawn_refresh_worker(requests, channels.completion_tx.clone(), fetcher, store);
    spawn_tick_worker(channels.tick_tx.clone());

    setup_terminal()?;
    let mut terminal = match Terminal::new(CrosstermBackend::new(std::io::stdout())) {
        Ok(t) => t,
        Err(e) => {
            let _ = restore_terminal();
            return Err(e.into());
        }
    };
    spawn_event_thread(
        channels.event_tx.clone(),
        channels.event_thread_cancelled.clone(),
    );

    session.start();
    run_event_loop(&mut terminal, &mut session, &mut channels).await;

    channels
        .event_thread_cancelled
        .store(true, Ordering::Relaxed);
    if let Err(e) = restore_terminal() {
        warn!(error = %e, "failed to restore terminal");
    }
    let _ = terminal.show_cursor();
    info!(
        had_snapshot = session.had_snapshot(),
        load_failed = session.load_failed(),
        "session ended"
    );
    Ok(!session.load_failed())
}
