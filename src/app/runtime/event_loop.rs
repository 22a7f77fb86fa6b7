use std::time::Instant;

use ratatui::{Terminal, backend::Backend};
use tokio::select;
use tracing::debug;

use crate::state::{Session, SessionState};
use crate::ui::render;

use super::channels::Channels;

/// What: Wait for one message from any source and apply it to the session.
///
/// Inputs:
/// - `session`: The state machine
/// - `channels`: Event, completion, job and tick receivers
///
/// Output: `true` if the event loop should exit
///
/// Details:
/// - Completions are applied one at a time, in arrival order.
/// - Returns `true` when every source has closed.
async fn process_channel_messages(session: &mut Session, channels: &mut Channels) -> bool {
    select! {
        Some(ev) = channels.event_rx.recv() => {
            crate::events::handle_event(&ev, session)
        }
        Some(completion) = channels.completion_rx.recv() => {
            let rebuilt = session.apply_refresh(completion);
            debug!(rebuilt, state = session.state().label(), "applied refresh completion");
            false
        }
        Some(job) = channels.job_rx.recv() => {
            session.apply_job(job);
            false
        }
        Some(()) = channels.tick_rx.recv() => {
            session.tick(Instant::now());
            false
        }
        else => true
    }
}

/// What: Render and process messages until the session shuts down.
///
/// Inputs:
/// - `terminal`: Terminal to draw on
/// - `session`: The state machine
/// - `channels`: Communication channels for background workers
///
/// Details:
/// - A failed draw is logged and the loop continues.
pub async fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    channels: &mut Channels,
) {
    loop {
        if let Err(e) = terminal.draw(|f| render(f, session)) {
            debug!(error = %e, "draw failed");
        }
        if process_channel_messages(session, channels).await
            || *session.state() == SessionState::Shutdown
        {
            break;
        }
    }
}
