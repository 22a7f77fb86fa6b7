use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::Event as CEvent;
use tokio::sync::mpsc;

/// Tick period: notice expiry and scheduled refresh checks.
const TICK_INTERVAL: Duration = Duration::from_millis(250);
/// How long the reader thread waits for input before rechecking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What: Spawn the blocking terminal event reader.
///
/// Inputs:
/// - `event_tx`: Where events are sent
/// - `cancelled`: Set by the runtime on exit
///
/// Details:
/// - Polls with a short timeout so the thread notices cancellation promptly.
/// - Exits when cancelled or when the receiver is gone; read errors are skipped.
pub fn spawn_event_thread(event_tx: mpsc::UnboundedSender<CEvent>, cancelled: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        while !cancelled.load(Ordering::Relaxed) {
            match crossterm::event::poll(POLL_INTERVAL) {
                Ok(true) => {
                    let Ok(ev) = crossterm::event::read() else {
                        continue;
                    };
                    if cancelled.load(Ordering::Relaxed) || event_tx.send(ev).is_err() {
                        break;
                    }
                }
                Ok(false) | Err(_) => {}
            }
        }
    });
}

/// Spawn the timer task that feeds periodic ticks; stops when the receiver is gone.
pub fn spawn_tick_worker(tick_tx: mpsc::UnboundedSender<()>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tick_tx.send(()).is_err() {
                break;
            }
        }
    });
}
