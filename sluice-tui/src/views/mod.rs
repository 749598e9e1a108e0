//! View rendering dispatch.

pub mod board;
pub mod detail;

use crate::notifications::NotificationLevel;
use crate::state::App;
use crate::theme::notification_color;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Span,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub fn render_view(f: &mut Frame<'_>, app: &App) {
    render_header(f, app, app.layout.header);
    board::render(f, app);
    render_footer(f, app, app.layout.footer);

    if let Some(record) = app.detail_record() {
        detail::render(f, app, record, centered(f.size(), 60, 50));
    }
    if app.help_visible {
        render_help(f, app, centered(f.size(), 50, 40));
    }
}

fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let access = if app.board.can_reorder() { "edit" } else { "read-only" };
    let sync = if app.commits_in_flight > 0 { " | saving" } else { "" };
    let title = format!(
        "SLUICE | {} | {} | {} records | {}{}",
        app.config.collection,
        app.records.revision,
        app.records.records.len(),
        access,
        sync
    );
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        title,
        Style::default().fg(app.theme.primary),
    ));
    f.render_widget(block, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let help = "drag cards to move • click to open • r repair • ? help • Esc cancel • q quit";
    let (text, style) = match app.notifications.last() {
        Some(note) => (
            format!("{}: {}", note.level.label(), note.message),
            Style::default().fg(notification_color(note.level, &app.theme)),
        ),
        None => (
            help.to_string(),
            Style::default().fg(notification_color(NotificationLevel::Info, &app.theme)),
        ),
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(footer, area);
}

fn render_help(f: &mut Frame<'_>, app: &App, area: Rect) {
    let text = [
        "Mouse: press a card and drag it to another slot",
        "Short press: open the record",
        "Esc: cancel drag / close panel",
        "r: resequence every column",
        "?: toggle this help",
        "q: quit",
    ]
    .join("\n");
    let widget = Paragraph::new(text)
        .block(
            Block::default()
                .title("Keybindings")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.secondary)),
        )
        .style(Style::default().fg(app.theme.text).bg(app.theme.bg))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}

/// A rectangle of `percent_x` by `percent_y` centred in `area`.
pub fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
