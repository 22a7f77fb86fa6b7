//! Keyboard handling.
//!
//! Keys are dispatched on the session state first (detail view, error view),
//! then on the input mode. Handlers only call [`Session`] methods; they never
//! touch the index or the network directly.

use crossterm::event::{Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::state::{InputMode, Session, SessionState};

mod channel_mode;
mod filter_mode;
mod normal_mode;
mod platform_mode;
#[cfg(test)]
mod tests;

/// What: Dispatch one terminal event to the session.
///
/// Inputs:
/// - `ev`: Terminal event from crossterm.
/// - `session`: Session to mutate.
///
/// Output:
/// - `true` when the application should exit.
///
/// Details:
/// - Only key presses are handled; releases, repeats and mouse events are ignored.
/// - `Ctrl-C` quits from any state and mode.
pub fn handle_event(ev: &CEvent, session: &mut Session) -> bool {
    let CEvent::Key(ke) = ev else {
        return false;
    };
    if ke.kind != KeyEventKind::Press {
        return false;
    }
    if ke.modifiers.contains(KeyModifiers::CONTROL) && ke.code == KeyCode::Char('c') {
        session.quit();
        return true;
    }
    match session.state() {
        SessionState::Shutdown => return true,
        SessionState::Detail(_) => handle_detail_key(*ke, session),
        _ => match session.input_mode() {
            InputMode::Filter => filter_mode::handle_filter_key(*ke, session),
            InputMode::Normal => normal_mode::handle_normal_key(*ke, session),
            InputMode::Platforms => platform_mode::handle_platform_key(*ke, session),
            InputMode::Channel => channel_mode::handle_channel_key(*ke, session),
        },
    }
    session.state() == &SessionState::Shutdown
}

/// What: Keys of the detail view.
///
/// Details:
/// - `j`/`k` walk the version list; `Enter` folds a platform section or inspects an entry.
/// - `d` downloads the highlighted entry.
fn handle_detail_key(ke: KeyEvent, session: &mut Session) {
    match ke.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => {
            session.close_detail();
        }
        KeyCode::Char('j') | KeyCode::Down => session.move_version_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => session.move_version_cursor(-1),
        KeyCode::Enter => session.activate_version_row(),
        KeyCode::Char('d') => {
            session.request_download();
        }
        KeyCode::Char('r') => {
            session.request_refresh();
        }
        KeyCode::Char('q') => session.quit(),
        _ => {}
    }
}
