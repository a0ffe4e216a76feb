use crate::ui::state::AppState;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

pub struct PredictionsWidget;

impl PredictionsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState, now: DateTime<Utc>) {
        let predictions_text = match state.burn_rate() {
            Some(br) if state.usage_monitor.current_block(now).is_some() => {
                let current_tokens = state.current_tokens(now);
                let remaining_tokens = state.plan.max_tokens().saturating_sub(current_tokens);
                let hours = if remaining_tokens == 0 {
                    0.0
                } else if br.tokens_per_minute > 0.0 {
                    remaining_tokens as f64 / br.tokens_per_minute / 60.0
                } else {
                    f64::INFINITY
                };
                let (time_to_reset, _) = state.time_to_reset(now);

                let limit_text = if hours <= 0.0 {
                    "Limit reached".to_string()
                } else if hours.is_infinite() {
                    "Not on track to reach limit".to_string()
                } else {
                    format!("{:.1} hours", hours)
                };

                vec![
                    Line::from(vec![
                        Span::styled("Estimated time to limit: ", Style::default().fg(Color::White)),
                        Span::styled(
                            limit_text,
                            Style::default()
                                .fg(if hours < 1.0 { Color::Red } else { Color::Green })
                                .add_modifier(Modifier::BOLD),
                        ),
                    ]),
                    Line::from(vec![
                        Span::styled("Session time remaining: ", Style::default().fg(Color::White)),
                        Span::styled(
                            time_to_reset,
                            Style::default()
                                .fg(Color::Blue)
                                .add_modifier(Modifier::BOLD),
                        ),
                    ]),
                ]
            }
            _ => Self::no_data_text(state),
        };

        let predictions = Paragraph::new(predictions_text)
            .block(Block::bordered().title("Predictions"))
            .alignment(Alignment::Left);

        frame.render_widget(predictions, area);
    }

    fn no_data_text(state: &AppState) -> Vec<Line<'static>> {
        let headline = if state.data_loaded && !state.usage_monitor.is_empty() {
            "No active session block"
        } else if state.data_loaded {
            "No usage data in loaded files"
        } else {
            "No Claude usage data found"
        };

        let mut lines = vec![
            Line::from(Span::styled(headline, Style::default().fg(Color::Red))),
            Line::from(" "),
        ];

        if !state.data_loaded && !state.searched_paths.is_empty() {
            let gray = Style::default().fg(Color::Gray);
            lines.push(Line::from(Span::styled("Searched in:", gray)));
            for path in &state.searched_paths {
                lines.push(Line::from(Span::styled(
                    format!("  {}", path.display()),
                    gray,
                )));
            }
        }

        lines
    }
}
