use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};

use crate::index::PackageRecord;
use crate::state::{Session, VersionRow};
use crate::ui::theme;
use crate::util::{format_bytes, ts_to_date};

/// Label column width in the field list.
const LABEL_WIDTH: usize = 13;

/// One `label: value` line of the field list.
fn field(label: &str, value: String) -> Line<'static> {
    let th = theme();
    Line::from(vec![
        Span::styled(
            format!("{label:<LABEL_WIDTH$}"),
            Style::default().fg(th.sapphire).add_modifier(Modifier::BOLD),
        ),
        Span::styled(value, Style::default().fg(th.text)),
    ])
}

/// What: Build the field lines for `record`.
///
/// Output:
/// - Every record field; absent optional fields render as `-`.
fn field_lines(record: &PackageRecord) -> Vec<Line<'static>> {
    let or_dash = |v: Option<&String>| v.map_or_else(|| "-".to_string(), Clone::clone);
    let mut lines = vec![
        field("Name", record.name.clone()),
        field("Version", record.version.to_string()),
        field("Build", record.build.clone()),
        field("Build number", record.build_number.to_string()),
        field("Platform", record.subdir.clone()),
        field("Channel", record.channel.base_url().to_string()),
        field("File", record.file_name.clone()),
        field("Size", record.size.map_or_else(|| "-".to_string(), format_bytes)),
        field("License", or_dash(record.license.as_ref())),
        field(
            "Timestamp",
            record
                .timestamp
                .map_or_else(|| "-".to_string(), |t| ts_to_date(Some(t))),
        ),
        field("MD5", or_dash(record.md5.as_ref())),
        field("SHA256", or_dash(record.sha256.as_ref())),
        Line::from(""),
    ];
    let th = theme();
    lines.push(Line::from(Span::styled(
        format!("Dependencies ({})", record.depends.len()),
        Style::default().fg(th.mauve).add_modifier(Modifier::BOLD),
    )));
    if record.depends.is_empty() {
        lines.push(Line::from(Span::styled(
            "  none",
            Style::default().fg(th.overlay1),
        )));
    }
    for dep in &record.depends {
        lines.push(Line::from(Span::styled(
            format!("  {dep}"),
            Style::default().fg(th.text),
        )));
    }
    lines
}

/// What: Draw the detail view for one record.
///
/// Inputs:
/// - `f`: Frame to render into
/// - `session`: Session used to look up the other versions of the package
/// - `record`: Record being inspected
/// - `area`: Target rectangle
///
/// Details:
/// - Left pane: every field of the record. Right pane: all versions of the same
///   package under foldable platform headers, the inspected build marked and
///   the version cursor highlighted.
pub fn render_detail(f: &mut Frame, session: &Session, record: &PackageRecord, area: Rect) {
    let th = theme();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let info = Paragraph::new(field_lines(record))
        .block(
            Block::default()
                .title(Span::styled(
                    format!(" {} ", record.name),
                    Style::default().fg(th.mauve),
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(th.overlay1)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(info, cols[0]);

    let cursor = session.version_cursor();
    let mut lines: Vec<Line> = Vec::new();
    for (i, row) in session.version_rows().into_iter().enumerate() {
        let mut line = match row {
            VersionRow::Section {
                subdir,
                count,
                collapsed,
            } => {
                let marker = if collapsed { "▸" } else { "▾" };
                Line::from(Span::styled(
                    format!("{marker} {subdir} ({count})"),
                    Style::default().fg(th.sapphire).add_modifier(Modifier::BOLD),
                ))
            }
            VersionRow::Entry(r) => {
                let current = *r == *record;
                let marker = if current { "  ● " } else { "    " };
                let style = if current {
                    Style::default().fg(th.green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(th.text)
                };
                Line::from(vec![
                    Span::styled(format!("{marker}{}", r.version), style),
                    Span::styled(format!("  {}", r.build), Style::default().fg(th.subtext0)),
                ])
            }
        };
        if i == cursor {
            line = line.style(Style::default().bg(th.surface1));
        }
        lines.push(line);
    }
    let skip = cursor.saturating_sub(usize::from(cols[1].height.saturating_sub(3)));
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();
    let versions = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(" Versions ", Style::default().fg(th.mauve)))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(th.overlay1)),
    );
    f.render_widget(versions, cols[1]);
}
