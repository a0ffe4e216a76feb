use super::components::{
    BlockPopupWidget, HeaderWidget, LifetimePopupWidget, PredictionsWidget, ProgressBarsWidget,
    ShortcutsWidget, StatisticsWidget,
};
use super::refresher::{RefreshMessage, Refresher};
use super::state::{AppState, PopupType};
use crate::billing::ClaudePlan;
use crate::monitor::LoadSettings;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    DefaultTerminal, Frame,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Live usage dashboard
pub struct App {
    state: AppState,
    settings: LoadSettings,
    refresh_interval: Duration,
}

impl App {
    pub fn new(
        plan: ClaudePlan,
        settings: LoadSettings,
        refresh_interval: Duration,
        searched_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            state: AppState::new(plan, searched_paths),
            settings,
            refresh_interval,
        }
    }

    /// Run the dashboard until the user quits
    pub async fn run(mut self) -> Result<()> {
        let refresher = Refresher::new(self.settings.clone(), self.refresh_interval);
        let (mut refresh_rx, trigger) = refresher.start();

        let mut terminal = ratatui::init();
        let result = self.main_loop(&mut terminal, &mut refresh_rx, &trigger);
        ratatui::restore();

        info!("Dashboard closed");
        result
    }

    fn main_loop(
        &mut self,
        terminal: &mut DefaultTerminal,
        refresh_rx: &mut mpsc::Receiver<RefreshMessage>,
        trigger: &mpsc::Sender<()>,
    ) -> Result<()> {
        while self.state.running {
            let now = Utc::now();
            terminal.draw(|frame| draw(frame, &self.state, now))?;

            self.state.tick_spinner();

            if event::poll(EVENT_POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers, trigger);
                    }
                }
            }

            while let Ok(message) = refresh_rx.try_recv() {
                self.apply_message(message, Utc::now());
            }
        }

        Ok(())
    }

    fn apply_message(&mut self, message: RefreshMessage, now: DateTime<Utc>) {
        match message {
            RefreshMessage::Loading => self.state.begin_loading(),
            RefreshMessage::Loaded(monitor) => self.state.apply_loaded(monitor, now),
            RefreshMessage::Error(error) => self.state.apply_error(error, now),
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, trigger: &mpsc::Sender<()>) {
        match code {
            KeyCode::Char('q') => self.state.quit(),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => self.state.quit(),
            KeyCode::Char('r') => {
                // A reload already queued covers this one
                if trigger.try_send(()).is_ok() {
                    self.state.begin_loading();
                }
            }
            KeyCode::Char('d') => self.state.toggle_popup(PopupType::CurrentBlock),
            KeyCode::Char('s') => self.state.toggle_popup(PopupType::LifetimeStats),
            KeyCode::Esc => self.state.close_popup(),
            _ => {}
        }
    }
}

/// Draw the full dashboard for `state` as of `now`
pub fn draw(frame: &mut Frame, state: &AppState, now: DateTime<Utc>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Progress bars
            Constraint::Length(6), // Statistics
            Constraint::Min(5),    // Predictions
            Constraint::Length(1), // Shortcuts
        ])
        .split(frame.area());

    HeaderWidget::render(frame, chunks[0], state);
    ProgressBarsWidget::render(frame, chunks[1], state, now);
    StatisticsWidget::render(frame, chunks[2], state, now);
    PredictionsWidget::render(frame, chunks[3], state, now);
    ShortcutsWidget::render(frame, chunks[4]);

    match state.active_popup {
        Some(PopupType::CurrentBlock) => BlockPopupWidget::render(frame, frame.area(), state, now),
        Some(PopupType::LifetimeStats) => LifetimePopupWidget::render(frame, frame.area(), state),
        None => {}
    }
}
