//! Terminal rendering of a [`Session`].
//!
//! Rendering only reads the session; it never mutates state or performs I/O
//! beyond drawing into the frame it is given.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Block,
};

use crate::state::{Session, SessionState};

mod details;
mod platforms;
mod results;
mod status;
pub mod theme;

pub use theme::{Theme, theme};

/// Height of the filter input block.
const FILTER_HEIGHT: u16 = 3;
/// Height of the status area at the bottom.
const STATUS_HEIGHT: u16 = 3;

/// What: Draw one full frame for `session`.
///
/// Inputs:
/// - `f`: Frame to render into.
/// - `session`: Session to display.
///
/// Details:
/// - Layout top to bottom: filter line, body, status area.
/// - The body follows the session state: loading view, error view, detail pane
///   or the result list. An open platform selector replaces the body.
pub fn render(f: &mut Frame, session: &Session) {
    let th = theme();
    let area = f.area();
    f.render_widget(Block::default().style(Style::default().bg(th.base)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(FILTER_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(area);

    results::render_filter(f, session, chunks[0]);
    if let Some(picker) = session.picker() {
        platforms::render_platforms(f, picker, chunks[1]);
        status::render_status(f, session, chunks[2]);
        return;
    }
    match session.state() {
        SessionState::Loading => results::render_loading(f, session, chunks[1]),
        SessionState::Error(message) => results::render_error(f, message, chunks[1]),
        SessionState::Detail(record) => details::render_detail(f, session, record, chunks[1]),
        SessionState::Browsing | SessionState::Refreshing | SessionState::Shutdown => {
            results::render_results(f, session, chunks[1]);
        }
    }
    status::render_status(f, session, chunks[2]);
}
