use crossterm::event::{KeyCode, KeyEvent};

use crate::state::{InputMode, NoticeLevel, Session};

/// What: Handle a key while the result list has navigation focus.
///
/// Inputs:
/// - `ke`: Key press.
/// - `session`: Session to mutate.
///
/// Details:
/// - `/` or `f` switches to filter editing; `Esc` clears a non-empty filter.
/// - `r` starts a refresh of every channel and says so in the status area.
/// - `p` opens the platform selector, `c` the channel editor, `d` downloads
///   the highlighted artifact. `b` goes back a page.
pub(super) fn handle_normal_key(ke: KeyEvent, session: &mut Session) {
    match ke.code {
        KeyCode::Char('q') => session.quit(),
        KeyCode::Char('/' | 'f') => session.set_input_mode(InputMode::Filter),
        KeyCode::Esc => session.clear_filter(),
        KeyCode::Char('j') | KeyCode::Down => session.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => session.move_selection(-1),
        KeyCode::Char('n') | KeyCode::PageDown => {
            session.next_page();
        }
        KeyCode::Char('b') | KeyCode::PageUp => {
            session.prev_page();
        }
        KeyCode::Char('g') | KeyCode::Home => session.select_first(),
        KeyCode::Char('G') | KeyCode::End => session.select_last(),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
            session.open_detail();
        }
        KeyCode::Char('p') => session.open_platform_picker(),
        KeyCode::Char('c') => session.open_channel_edit(),
        KeyCode::Char('d') => {
            session.request_download();
        }
        KeyCode::Char('r') => {
            if session.request_refresh() > 0 {
                session.set_notice("refreshing channel indexes", NoticeLevel::Info);
            }
        }
        _ => {}
    }
}
