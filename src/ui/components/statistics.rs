use crate::billing::BurnLevel;
use crate::ui::state::AppState;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

const MAX_ERROR_CHARS: usize = 50;

pub struct StatisticsWidget;

impl StatisticsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState, now: DateTime<Utc>) {
        let label = Style::default().fg(Color::White);
        let current_tokens = state.current_tokens(now);

        let (status, status_color) = if state.data_loaded {
            (
                format!("Loaded ({} entries)", state.usage_monitor.entry_count()),
                Color::Green,
            )
        } else if state.is_loading {
            ("Loading...".to_string(), Color::Yellow)
        } else {
            ("No data".to_string(), Color::Red)
        };

        let (burn_text, burn_color) = match state.burn_rate() {
            Some(br) => {
                let color = match state.thresholds.classify(br.tokens_per_minute) {
                    BurnLevel::High => Color::Red,
                    BurnLevel::Elevated => Color::Yellow,
                    BurnLevel::Normal => Color::Green,
                };
                (
                    format!("{:.1} tokens/min {}", br.tokens_per_minute, br.trend.arrow()),
                    color,
                )
            }
            None => ("N/A".to_string(), Color::Gray),
        };

        let mut stats_text = vec![
            Line::from(vec![
                Span::styled("Data Status: ", label),
                Span::styled(
                    status,
                    Style::default()
                        .fg(status_color)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Tokens: ", label),
                Span::styled(
                    current_tokens.to_string(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" / {}", state.plan.max_tokens()),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::styled("Burn Rate: ", label),
                Span::styled(
                    burn_text,
                    Style::default().fg(burn_color).add_modifier(Modifier::BOLD),
                ),
            ]),
        ];

        if let Some(error) = state.truncated_error(MAX_ERROR_CHARS) {
            stats_text.push(Line::from(vec![
                Span::styled("Error: ", Style::default().fg(Color::Red)),
                Span::styled(error, Style::default().fg(Color::Red)),
            ]));
        } else {
            let last_update = state
                .last_update
                .map(|t| t.format("%H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            stats_text.push(Line::from(vec![
                Span::styled("Last Update: ", label),
                Span::styled(last_update, Style::default().fg(Color::Cyan)),
            ]));
        }

        let stats = Paragraph::new(stats_text)
            .block(Block::bordered().title("Statistics"))
            .alignment(Alignment::Left);

        frame.render_widget(stats, area);
    }
}
