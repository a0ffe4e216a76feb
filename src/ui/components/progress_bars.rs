use super::usage_color;
use crate::ui::state::AppState;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Gauge},
    Frame,
};

pub struct ProgressBarsWidget;

impl ProgressBarsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState, now: DateTime<Utc>) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let usage_percentage = state.usage_percentage(now);
        let token_gauge = Gauge::default()
            .block(Block::bordered().title("Token Usage"))
            .gauge_style(Style::default().fg(usage_color(usage_percentage)))
            .percent(usage_percentage.clamp(0.0, 100.0) as u16)
            .label(format!("{:.1}%", usage_percentage));

        frame.render_widget(token_gauge, chunks[0]);

        let (time_remaining, elapsed) = state.time_to_reset(now);
        let session_hours = state.usage_monitor.session_duration().num_hours();
        let time_gauge = Gauge::default()
            .block(Block::bordered().title(format!("Session Time ({}h blocks)", session_hours)))
            .gauge_style(Style::default().fg(Color::Blue))
            .ratio(elapsed.clamp(0.0, 1.0))
            .label(format!("{} remaining", time_remaining));

        frame.render_widget(time_gauge, chunks[1]);
    }
}
