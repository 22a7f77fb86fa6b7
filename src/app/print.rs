use std::io::Write;

use tokio::sync::mpsc;
use tracing::info;

use crate::index::{ChannelReference, QuerySpec, spawn_refresh_worker};
use crate::state::{Session, SessionHandle, new_session};

use super::{Result, RunOptions};

/// What: Load every channel without the TUI and print the first result page.
///
/// Inputs:
/// - `channels`: Channel partitions in priority order.
/// - `query`: Filter text and page size.
/// - `options`: Network and cache settings; refresh and download settings are ignored.
/// - `out`: Destination for the listing.
///
/// Output:
/// - `Ok(true)` when the page was printed, `Ok(false)` when every channel
///   failed and nothing was cached (the failure reasons are printed instead).
pub async fn run_print<W: Write>(
    channels: Vec<ChannelReference>,
    query: QuerySpec,
    options: RunOptions,
    out: &mut W,
) -> Result<bool> {
    let (fetcher, store) = options.backends()?;
    let SessionHandle {
        mut session,
        requests,
        ..
    } = new_session(channels, query);
    session.set_use_cache(options.use_cache);

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
    spawn_refresh_worker(requests, completion_tx, fetcher, store);
    session.start();
    while session.in_flight() > 0 {
        let Some(completion) = completion_rx.recv().await else {
            break;
        };
        session.apply_refresh(completion);
    }
    info!(state = session.state().label(), "print mode loaded");
    write_listing(&session, out)?;
    Ok(!session.load_failed())
}

/// What: Write the session's current page, or why there is none, as plain text.
fn write_listing<W: Write>(session: &Session, out: &mut W) -> std::io::Result<()> {
    if let crate::state::SessionState::Error(message) = session.state() {
        writeln!(out, "no channel index could be loaded:")?;
        for line in message.lines() {
            writeln!(out, "  {line}")?;
        }
        return Ok(());
    }
    if let Some(err) = session.query_error() {
        writeln!(out, "invalid filter: {err}")?;
        return Ok(());
    }
    let page = session.page();
    for r in &page.records {
        writeln!(
            out,
            "{:<32} {:<16} {:<24} {:<14} {}",
            r.name,
            r.version,
            r.build,
            r.subdir,
            r.channel.short_name()
        )?;
    }
    let size = session.page_size();
    writeln!(
        out,
        "{} match(es), page {}/{}",
        page.total,
        page.page_number(size),
        page.page_count(size)
    )?;
    Ok(())
}
