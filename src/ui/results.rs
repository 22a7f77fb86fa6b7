use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::index::PackageRecord;
use crate::state::{InputMode, Session};
use crate::ui::theme;

/// What: Draw the filter input with any query problem shown inline.
///
/// Inputs:
/// - `f`: Frame to render into
/// - `session`: Session providing the filter text, input mode and query error
/// - `area`: Target rectangle
///
/// Details:
/// - The border is highlighted and the terminal cursor placed after the text while
///   the filter is being edited.
/// - While the channel editor is open the same line shows the channel draft instead.
pub fn render_filter(f: &mut Frame, session: &Session, area: Rect) {
    let th = theme();
    let channel = session.input_mode() == InputMode::Channel;
    let editing = channel || session.input_mode() == InputMode::Filter;
    let border = if editing { th.sapphire } else { th.overlay1 };
    let text = if channel {
        session.channel_draft()
    } else {
        session.filter_text()
    };

    let mut spans = vec![
        Span::styled("> ", Style::default().fg(th.sapphire)),
        Span::styled(text.to_string(), Style::default().fg(th.text)),
    ];
    if text.is_empty() && !editing {
        spans.push(Span::styled(
            "press / to filter",
            Style::default().fg(th.overlay1),
        ));
    }
    if let Some(err) = session.query_error().filter(|_| !channel) {
        spans.push(Span::styled(
            format!("  {err}"),
            Style::default().fg(th.red),
        ));
    }

    let title = if channel { " Channel " } else { " Filter " };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(th.mauve)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);

    if editing && area.height > 2 {
        let width = u16::try_from(text.width()).unwrap_or(u16::MAX);
        let x = area
            .x
            .saturating_add(3)
            .saturating_add(width)
            .min(area.right().saturating_sub(2));
        f.set_cursor_position(Position::new(x, area.y + 1));
    }
}

/// One result row: name, version, build, platform and channel.
fn record_line(record: &PackageRecord) -> Line<'static> {
    let th = theme();
    Line::from(vec![
        Span::styled(
            record.name.clone(),
            Style::default().fg(th.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(record.version.to_string(), Style::default().fg(th.green)),
        Span::raw("  "),
        Span::styled(record.build.clone(), Style::default().fg(th.subtext0)),
        Span::raw("  "),
        Span::styled(record.subdir.clone(), Style::default().fg(th.sapphire)),
        Span::raw("  "),
        Span::styled(record.channel.short_name(), Style::default().fg(th.overlay1)),
    ])
}

/// What: Draw the current result page with the highlighted row.
///
/// Inputs:
/// - `f`: Frame to render into
/// - `session`: Session providing the page and selection
/// - `area`: Target rectangle
///
/// Details:
/// - The title carries the total match count, the page position and the match tier.
/// - Rows beyond the viewport scroll with the selection.
pub fn render_results(f: &mut Frame, session: &Session, area: Rect) {
    let th = theme();
    let page = session.page();
    let size = session.page_size();
    let mut title = format!(
        " Results {} | page {}/{} ",
        page.total,
        page.page_number(size),
        page.page_count(size)
    );
    if let Some(tier) = page.tier {
        title.push_str(&format!("| {} ", tier.label()));
    }
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(th.mauve)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(th.overlay1));

    if page.records.is_empty() {
        let message = if session.filter_text().is_empty() {
            "No packages in the loaded channels."
        } else {
            "No packages match the filter."
        };
        let p = Paragraph::new(Span::styled(message, Style::default().fg(th.subtext0)))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = page
        .records
        .iter()
        .map(|r| ListItem::new(record_line(r)))
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(th.surface1))
        .highlight_symbol("▶ ");
    let mut state = ListState::default().with_selected(Some(session.selected()));
    f.render_stateful_widget(list, area, &mut state);
}

/// What: Draw the view shown before the first snapshot arrives.
///
/// Details:
/// - Lists every configured channel with a waiting marker or its record count.
pub fn render_loading(f: &mut Frame, session: &Session, area: Rect) {
    let th = theme();
    let mut lines = vec![
        Line::from(Span::styled(
            "Loading channel indexes...",
            Style::default().fg(th.yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for status in session.channel_status() {
        let (mark, color) = match status.records {
            Some(n) => (format!("{n} packages"), th.green),
            None => ("waiting".to_string(), th.overlay1),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {}  ", status.label), Style::default().fg(th.text)),
            Span::styled(mark, Style::default().fg(color)),
        ]));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(th.overlay1));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

/// What: Draw the blocking error view shown when no channel produced a snapshot.
pub fn render_error(f: &mut Frame, message: &str, area: Rect) {
    let th = theme();
    let mut lines = vec![
        Line::from(Span::styled(
            "No channel index could be loaded.",
            Style::default().fg(th.red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(
        message
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(th.text)))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press r to retry or q to quit.",
        Style::default().fg(th.subtext0),
    )));
    let block = Block::default()
        .title(Span::styled(" Error ", Style::default().fg(th.red)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(th.red));
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
