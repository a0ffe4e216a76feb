use super::{centered_rect, model_label, usage_color};
use crate::ui::state::AppState;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

/// Totals across every loaded session block
pub struct LifetimePopupWidget;

impl LifetimePopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let popup_area = centered_rect(60, 80, area);
        frame.render_widget(Clear, popup_area);

        let popup = Paragraph::new(Self::lifetime_text(state))
            .block(
                Block::bordered()
                    .title("Session Statistics")
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Cyan)),
            )
            .alignment(Alignment::Left);

        frame.render_widget(popup, popup_area);
    }

    fn lifetime_text(state: &AppState) -> Vec<Line<'static>> {
        let monitor = &state.usage_monitor;
        let value = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);
        let label = Style::default().fg(Color::White);
        let percentage = monitor.plan_usage_percentage(state.plan);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Total Tokens: ", label),
                Span::styled(
                    (monitor.total_weighted_tokens() as u64).to_string(),
                    value(Color::Yellow),
                ),
            ]),
            Line::from(vec![
                Span::styled("Usage: ", label),
                Span::styled(format!("{:.1}%", percentage), value(usage_color(percentage))),
            ]),
            Line::from(vec![
                Span::styled("Total Cost: ", label),
                Span::styled(format!("${:.3}", monitor.total_cost()), value(Color::Green)),
            ]),
            Line::from(vec![
                Span::styled("Session Blocks: ", label),
                Span::styled(monitor.session_count().to_string(), value(Color::Cyan)),
            ]),
        ];

        if let Some(avg) = monitor.average_burn_rate() {
            lines.push(Line::from(vec![
                Span::styled("Average Burn Rate: ", label),
                Span::styled(
                    format!("{:.1} tokens/min", avg.tokens_per_minute),
                    value(Color::Green),
                ),
            ]));
        }

        if let Some(peak) = monitor.peak_burn_rate() {
            lines.push(Line::from(vec![
                Span::styled("Peak Burn Rate: ", label),
                Span::styled(
                    format!("{:.1} tokens/min", peak.tokens_per_minute),
                    value(Color::Red),
                ),
            ]));
        }

        lines.extend([
            Line::from(" "),
            Line::from(Span::styled("Model Breakdown (Lifetime):", value(Color::Cyan))),
            Line::from(" "),
        ]);

        for (model, (raw_tokens, cost)) in monitor.model_breakdown() {
            let weight = monitor.model_weight(&model);
            let weighted = (raw_tokens as f64 * weight) as u64;
            lines.push(Line::from(Span::styled(
                format!(
                    "  {}: {} → {} (×{}) ${:.2}",
                    model_label(&model),
                    raw_tokens,
                    weighted,
                    weight,
                    cost
                ),
                label,
            )));
        }

        lines.extend([
            Line::from(" "),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled("s", value(Color::Yellow)),
                Span::styled(" to close", Style::default().fg(Color::Gray)),
            ]),
        ]);

        lines
    }
}
