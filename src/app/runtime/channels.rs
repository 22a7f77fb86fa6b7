use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crossterm::event::Event as CEvent;
use tokio::sync::mpsc;

use crate::index::{JobCompletion, RefreshCompletion};

/// What: Channels between the event loop and its producers.
///
/// Details:
/// - Terminal events come from a blocking reader thread, ticks from a timer
///   task, completions from the refresh and job workers.
pub struct Channels {
    /// Terminal events, sender side for the reader thread.
    pub event_tx: mpsc::UnboundedSender<CEvent>,
    /// Terminal events.
    pub event_rx: mpsc::UnboundedReceiver<CEvent>,
    /// Set on exit so the reader thread stops polling.
    pub event_thread_cancelled: Arc<AtomicBool>,
    /// Completions, sender side for the refresh worker.
    pub completion_tx: mpsc::UnboundedSender<RefreshCompletion>,
    /// Refresh completions.
    pub completion_rx: mpsc::UnboundedReceiver<RefreshCompletion>,
    /// Job completions, sender side for the job worker.
    pub job_tx: mpsc::UnboundedSender<JobCompletion>,
    /// Discovery and download completions.
    pub job_rx: mpsc::UnboundedReceiver<JobCompletion>,
    /// Ticks, sender side for the timer task.
    pub tick_tx: mpsc::UnboundedSender<()>,
    /// Periodic ticks.
    pub tick_rx: mpsc::UnboundedReceiver<()>,
}

impl Channels {
    /// Create all channels used by the runtime.
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<CEvent>();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel::<RefreshCompletion>();
        let (job_tx, job_rx) = mpsc::unbounded_channel::<JobCompletion>();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel::<()>();
        Self {
            event_tx,
            event_rx,
            event_thread_cancelled: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
            job_tx,
            job_rx,
            tick_tx,
            tick_rx,
        }
    }
}
