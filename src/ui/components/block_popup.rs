use super::{centered_rect, model_label};
use crate::ui::state::AppState;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

/// Current block totals and per-model weighting
pub struct BlockPopupWidget;

impl BlockPopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState, now: DateTime<Utc>) {
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let popup = Paragraph::new(Self::breakdown_text(state, now))
            .block(
                Block::bordered()
                    .title("Current Block Breakdown")
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Cyan)),
            )
            .alignment(Alignment::Left);

        frame.render_widget(popup, popup_area);
    }

    fn breakdown_text(state: &AppState, now: DateTime<Utc>) -> Vec<Line<'static>> {
        let monitor = &state.usage_monitor;
        let value = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);
        let label = Style::default().fg(Color::White);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Block Tokens: ", label),
                Span::styled(state.current_tokens(now).to_string(), value(Color::Yellow)),
            ]),
            Line::from(vec![
                Span::styled("Block Cost: ", label),
                Span::styled(
                    format!("${:.3}", monitor.current_block_cost(now)),
                    value(Color::Green),
                ),
            ]),
            Line::from(vec![
                Span::styled("Block Duration: ", label),
                Span::styled(
                    format!("{:.1} min", monitor.current_block_duration(now)),
                    value(Color::Cyan),
                ),
            ]),
        ];

        if let Some(block) = monitor.current_block(now) {
            lines.push(Line::from(vec![
                Span::styled("Sessions: ", label),
                Span::styled(block.session_count().to_string(), value(Color::Cyan)),
            ]));
        }

        lines.extend([
            Line::from(" "),
            Line::from(Span::styled("Model Breakdown:", value(Color::Cyan))),
            Line::from(" "),
        ]);

        for (model, (raw_tokens, _cost)) in monitor.current_block_model_breakdown(now) {
            let weight = monitor.model_weight(&model);
            let weighted = (raw_tokens as f64 * weight) as u64;
            lines.push(Line::from(Span::styled(
                format!(
                    "  {}: {} → {} (×{})",
                    model_label(&model),
                    raw_tokens,
                    weighted,
                    weight
                ),
                label,
            )));
        }

        lines.extend([
            Line::from(" "),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled("d", value(Color::Yellow)),
                Span::styled(" to close", Style::default().fg(Color::Gray)),
            ]),
        ]);

        lines
    }
}
