use std::time::Instant;

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::state::{InputMode, NoticeLevel, Session, SessionState};
use crate::ui::theme;
use crate::util::ts_to_date;

/// Key hints for the bottom line, by what currently receives keys.
fn key_hints(session: &Session) -> &'static str {
    match (session.state(), session.input_mode()) {
        (SessionState::Detail(_), _) => {
            "j/k move  Enter fold/inspect  d download  Esc back  r refresh  q quit"
        }
        (_, InputMode::Platforms) => "j/k move  Space toggle  a all/defaults  Enter apply  Esc cancel",
        (_, InputMode::Channel) => "type channels  Enter switch  Esc cancel  Ctrl-U clear",
        (SessionState::Error(_), _) => "r retry  c channel  p platforms  q quit",
        (_, InputMode::Filter) => "type to filter  Enter/Esc done  Ctrl-U clear",
        (_, InputMode::Normal) => {
            "/ filter  j/k move  n/b page  Enter details  p platforms  c channel  d download  r refresh  q quit"
        }
    }
}

/// What: Draw the three status lines below the body.
///
/// Inputs:
/// - `f`: Frame to render into
/// - `session`: Session to summarise
/// - `area`: Target rectangle (three rows)
///
/// Details:
/// - Line 1: state label, index size, refreshes in flight and a running download.
/// - Line 2: one entry per channel with its record count and fetch time.
/// - Line 3: the current notice, or key hints when there is none.
pub fn render_status(f: &mut Frame, session: &Session, area: Rect) {
    let th = theme();
    let state = session.state();
    let state_color = match state {
        SessionState::Error(_) => th.red,
        SessionState::Loading | SessionState::Refreshing => th.yellow,
        _ => th.green,
    };
    let mut first = vec![
        Span::styled(
            format!(" {} ", state.label()),
            Style::default().fg(th.base).bg(state_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                "  {} packages, {} names",
                session.index().len(),
                session.index().name_count()
            ),
            Style::default().fg(th.subtext0),
        ),
    ];
    if session.in_flight() > 0 {
        first.push(Span::styled(
            format!("  {} fetch(es) in flight", session.in_flight()),
            Style::default().fg(th.yellow),
        ));
    }
    if let Some(file) = session.download_in_progress() {
        first.push(Span::styled(
            format!("  downloading {file}..."),
            Style::default().fg(th.sapphire),
        ));
    }

    let mut second = Vec::new();
    for status in session.channel_status() {
        let (text, color) = match (status.records, status.fetched_at) {
            (Some(n), Some(at)) => (format!("{} {n} @ {}", status.label, ts_to_date(Some(at))), th.green),
            (Some(n), None) => (format!("{} {n}", status.label), th.green),
            (None, _) => (format!("{} -", status.label), th.overlay1),
        };
        second.push(Span::styled(format!(" {text} "), Style::default().fg(color)));
    }

    let third = match session.notice().filter(|n| !n.is_expired(Instant::now())) {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => th.green,
                NoticeLevel::Warning => th.yellow,
            };
            Span::styled(format!(" {}", notice.text), Style::default().fg(color))
        }
        None => Span::styled(format!(" {}", key_hints(session)), Style::default().fg(th.overlay1)),
    };

    let lines = vec![Line::from(first), Line::from(second), Line::from(third)];
    f.render_widget(Paragraph::new(lines), area);
}
