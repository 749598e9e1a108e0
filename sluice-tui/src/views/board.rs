//! Board columns and cards.

use crate::state::App;
use crate::theme::stage_color;
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use sluice_core::RecordId;

pub fn render(f: &mut Frame<'_>, app: &App) {
    let dragged = app.dragged();
    for (stage, area) in app.layout.columns() {
        let ids = app.display.column(*stage);
        let color = stage_color(*stage);
        let column = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(
                format!("{} ({})", stage.label(), ids.len()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
        f.render_widget(column, *area);

        for (position, id) in ids.iter().enumerate() {
            let Some(card_area) = app.layout.card_area(*stage, position) else {
                break;
            };
            render_card(f, app, id, dragged == Some(id), card_area);
        }
    }
}

fn render_card(
    f: &mut Frame<'_>,
    app: &App,
    id: &RecordId,
    dragging: bool,
    area: ratatui::layout::Rect,
) {
    let (title, subtitle) = match app.record(id) {
        Some(record) => (
            record.title().to_string(),
            record.display.contact_email.clone().unwrap_or_default(),
        ),
        None => (id.to_string(), String::new()),
    };
    let style = if dragging {
        Style::default()
            .fg(app.theme.bg)
            .bg(app.theme.secondary)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(app.theme.text).bg(app.theme.bg_highlight)
    };
    let card = Paragraph::new(vec![
        Line::from(Span::styled(title, style)),
        Line::from(Span::styled(subtitle, Style::default().fg(app.theme.text_dim))),
    ])
    .block(
        Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(app.theme.border)),
    );
    f.render_widget(card, area);
}
