use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::state::{InputMode, Session};

/// What: Handle a key while the filter line is being edited.
///
/// Details:
/// - Printable characters (including `q`) go into the filter.
/// - `Enter` and `Esc` hand focus back to the list; the filter text stays.
/// - Arrow and page keys still move through the results.
pub(super) fn handle_filter_key(ke: KeyEvent, session: &mut Session) {
    match ke.code {
        KeyCode::Enter | KeyCode::Esc => session.set_input_mode(InputMode::Normal),
        KeyCode::Backspace => session.backspace(),
        KeyCode::Char('u') if ke.modifiers.contains(KeyModifiers::CONTROL) => {
            session.clear_filter();
        }
        KeyCode::Char(c) if !ke.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            session.push_char(c);
        }
        KeyCode::Down => session.move_selection(1),
        KeyCode::Up => session.move_selection(-1),
        KeyCode::PageDown => {
            session.next_page();
        }
        KeyCode::PageUp => {
            session.prev_page();
        }
        _ => {}
    }
}
