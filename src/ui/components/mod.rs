pub mod block_popup;
pub mod header;
pub mod lifetime_popup;
pub mod predictions;
pub mod progress_bars;
pub mod shortcuts;
pub mod statistics;

pub use block_popup::BlockPopupWidget;
pub use header::HeaderWidget;
pub use lifetime_popup::LifetimePopupWidget;
pub use predictions::PredictionsWidget;
pub use progress_bars::ProgressBarsWidget;
pub use shortcuts::ShortcutsWidget;
pub use statistics::StatisticsWidget;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color;

/// Helper function to create a centered rect
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Green below 60 %, yellow below 80 %, red above
pub(crate) fn usage_color(percentage: f64) -> Color {
    if percentage > 80.0 {
        Color::Red
    } else if percentage > 60.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Short family label for a model id
pub(crate) fn model_label(model: &str) -> &str {
    let lower = model.to_ascii_lowercase();
    if lower.contains("opus") {
        "Opus"
    } else if lower.contains("sonnet") {
        "Sonnet"
    } else if lower.contains("haiku") {
        "Haiku"
    } else {
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect() {
        let outer = Rect::new(0, 0, 100, 100);
        let inner = centered_rect(60, 70, outer);
        assert_eq!(inner, Rect::new(20, 15, 60, 70));
    }

    #[test]
    fn test_usage_color() {
        assert_eq!(usage_color(10.0), Color::Green);
        assert_eq!(usage_color(70.0), Color::Yellow);
        assert_eq!(usage_color(95.0), Color::Red);
    }

    #[test]
    fn test_model_label() {
        assert_eq!(model_label("claude-opus-4-20250514"), "Opus");
        assert_eq!(model_label("claude-3-5-haiku-20241022"), "Haiku");
        assert_eq!(model_label("gpt-4o"), "gpt-4o");
    }
}
