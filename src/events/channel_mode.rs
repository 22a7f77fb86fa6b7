use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::state::Session;

/// Handle a key while the channel line is being edited; `Enter` switches, `Esc` abandons.
pub(super) fn handle_channel_key(ke: KeyEvent, session: &mut Session) {
    match ke.code {
        KeyCode::Enter => {
            session.confirm_channel_edit();
        }
        KeyCode::Esc => session.cancel_channel_edit(),
        KeyCode::Backspace => session.channel_backspace(),
        KeyCode::Char('u') if ke.modifiers.contains(KeyModifiers::CONTROL) => {
            session.clear_channel_draft();
        }
        KeyCode::Char(c) if !ke.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            session.channel_push_char(c);
        }
        _ => {}
    }
}
