use crate::billing::block::floor_to_hour;
use crate::billing::{BurnRate, BurnRateThresholds, ClaudePlan};
use crate::monitor::UsageMonitor;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Which popup is shown over the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupType {
    CurrentBlock,
    LifetimeStats,
}

/// Everything the dashboard draws from
#[derive(Debug)]
pub struct AppState {
    pub usage_monitor: UsageMonitor,
    pub plan: ClaudePlan,
    pub thresholds: BurnRateThresholds,
    pub last_update: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub data_loaded: bool,
    pub error_message: Option<String>,
    pub active_popup: Option<PopupType>,
    /// Shown when no data could be found
    pub searched_paths: Vec<PathBuf>,
    pub running: bool,
    spinner_state: usize,
}

impl AppState {
    pub fn new(plan: ClaudePlan, searched_paths: Vec<PathBuf>) -> Self {
        Self {
            usage_monitor: UsageMonitor::new(),
            plan,
            thresholds: BurnRateThresholds::from_env(),
            last_update: None,
            is_loading: true,
            data_loaded: false,
            error_message: None,
            active_popup: None,
            searched_paths,
            running: true,
            spinner_state: 0,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn tick_spinner(&mut self) {
        self.spinner_state = (self.spinner_state + 1) % SPINNER_FRAMES.len();
    }

    pub fn spinner_char(&self) -> char {
        SPINNER_FRAMES[self.spinner_state % SPINNER_FRAMES.len()]
    }

    pub fn begin_loading(&mut self) {
        self.is_loading = true;
    }

    /// Swap in freshly loaded data
    pub fn apply_loaded(&mut self, monitor: UsageMonitor, now: DateTime<Utc>) {
        self.usage_monitor = monitor;
        self.data_loaded = true;
        self.error_message = None;
        self.is_loading = false;
        self.last_update = Some(now);
    }

    /// Record a failed reload; previously loaded data stays on screen
    pub fn apply_error(&mut self, error: String, now: DateTime<Utc>) {
        self.error_message = Some(error);
        self.is_loading = false;
        self.last_update = Some(now);
    }

    pub fn toggle_popup(&mut self, popup: PopupType) {
        self.active_popup = if self.active_popup == Some(popup) {
            None
        } else {
            Some(popup)
        };
    }

    pub fn close_popup(&mut self) {
        self.active_popup = None;
    }

    pub fn usage_percentage(&self, now: DateTime<Utc>) -> f64 {
        self.usage_monitor.current_block_percentage(self.plan, now)
    }

    /// Weighted tokens of the current block
    pub fn current_tokens(&self, now: DateTime<Utc>) -> u64 {
        self.usage_monitor.current_block_tokens(now) as u64
    }

    pub fn burn_rate(&self) -> Option<BurnRate> {
        self.usage_monitor.current_burn_rate()
    }

    /// Remaining session time as `H:MM` and the elapsed fraction of the block.
    ///
    /// Without an open block this describes the block a request made now would start.
    pub fn time_to_reset(&self, now: DateTime<Utc>) -> (String, f64) {
        let session = self.usage_monitor.session_duration();

        let (start, end) = match self.usage_monitor.current_block(now) {
            Some(block) => (block.start_time(), block.end_time()),
            None => {
                let start = floor_to_hour(now);
                let end = start.checked_add_signed(session).unwrap_or(DateTime::<Utc>::MAX_UTC);
                (start, end)
            }
        };

        let remaining = (end - now).max(Duration::zero());
        let total_minutes = remaining.num_minutes();
        let formatted = format!("{}:{:02}", total_minutes / 60, total_minutes % 60);

        let elapsed = if self.usage_monitor.current_block(now).is_some() {
            let fraction = (now - start).num_seconds() as f64 / session.num_seconds().max(1) as f64;
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        (formatted, elapsed)
    }

    /// Error text cut to `max` characters for the statistics panel
    pub fn truncated_error(&self, max: usize) -> Option<String> {
        self.error_message.as_ref().map(|error| {
            if error.chars().count() > max {
                error.chars().take(max).collect::<String>() + "..."
            } else {
                error.clone()
            }
        })
    }
}
