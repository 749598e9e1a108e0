//! Record detail panel, opened by clicking a card.

use crate::state::App;
use crate::theme::stage_color;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use sluice_core::PipelineRecord;

pub fn render(f: &mut Frame<'_>, app: &App, record: &PipelineRecord, area: Rect) {
    let label_style = Style::default().fg(app.theme.secondary);
    let fields = detail_fields(record);
    let lines: Vec<Line> = fields
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{}: ", label), label_style),
                Span::raw(value),
            ])
        })
        .collect();

    let widget = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(record.title().to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(stage_color(record.stage))),
        )
        .style(Style::default().fg(app.theme.text).bg(app.theme.bg))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}

/// Label/value pairs shown for a record. Missing values render as a dash.
pub fn detail_fields(record: &PipelineRecord) -> Vec<(&'static str, String)> {
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    vec![
        ("ID", record.id.to_string()),
        ("Stage", record.stage.label().to_string()),
        ("Position", record.position.to_string()),
        ("Business", or_dash(&record.display.business_name)),
        ("Contact", or_dash(&record.display.contact_name)),
        ("Email", or_dash(&record.display.contact_email)),
        (
            "Updated",
            record
                .updated_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ]
}
