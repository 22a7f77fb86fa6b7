use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState},
};

use crate::state::PlatformPicker;
use crate::ui::theme;

/// What: Draw the platform selector.
///
/// Details:
/// - One row per listed subdir with a tick for the ticked ones.
/// - The title says so while discovery is still running.
pub fn render_platforms(f: &mut Frame, picker: &PlatformPicker, area: Rect) {
    let th = theme();
    let title = if picker.discovering {
        " Platforms (discovering…) ".to_string()
    } else {
        format!(" Platforms {}/{} ", picker.draft.len(), picker.available.len())
    };
    let items: Vec<ListItem> = picker
        .available
        .iter()
        .map(|platform| {
            let (mark, style) = if picker.is_selected(platform) {
                (
                    "✓ ",
                    Style::default().fg(th.green).add_modifier(Modifier::BOLD),
                )
            } else {
                ("  ", Style::default().fg(th.text))
            };
            ListItem::new(Line::from(Span::styled(format!("{mark}{platform}"), style)))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(th.mauve)))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(th.sapphire)),
        )
        .highlight_style(Style::default().bg(th.surface1))
        .highlight_symbol("▶ ");
    let mut state = ListState::default().with_selected(Some(picker.cursor));
    f.render_stateful_widget(list, area, &mut state);
}
