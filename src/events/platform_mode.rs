use crossterm::event::{KeyCode, KeyEvent};

use crate::state::Session;

/// What: Handle a key while the platform selector is open.
///
/// Details:
/// - `Space` ticks the highlighted platform, `a` ticks all or goes back to the defaults.
/// - `Enter` applies the selection, `Esc` closes the selector unchanged.
pub(super) fn handle_platform_key(ke: KeyEvent, session: &mut Session) {
    match ke.code {
        KeyCode::Char('j') | KeyCode::Down => session.picker_move(1),
        KeyCode::Char('k') | KeyCode::Up => session.picker_move(-1),
        KeyCode::Char(' ') => session.toggle_platform(),
        KeyCode::Char('a') => session.toggle_all_platforms(),
        KeyCode::Enter => {
            session.apply_platform_selection();
        }
        KeyCode::Esc => session.cancel_picker(),
        KeyCode::Char('q') => session.quit(),
        _ => {}
    }
}
