use crate::monitor::{LoadSettings, UsageMonitor};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Message sent from the refresher to the main loop
#[derive(Debug)]
pub enum RefreshMessage {
    /// A reload has started
    Loading,
    Loaded(UsageMonitor),
    Error(String),
}

/// Reloads usage data on a fixed interval or on demand
pub struct Refresher {
    settings: LoadSettings,
    interval: Duration,
}

impl Refresher {
    pub fn new(settings: LoadSettings, interval: Duration) -> Self {
        Self { settings, interval }
    }

    /// Start the refresher task.
    ///
    /// Returns the result channel and a trigger for manual reloads. The first
    /// load happens immediately.
    pub fn start(self) -> (mpsc::Receiver<RefreshMessage>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(4);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            self.run(tx, trigger_rx).await;
        });

        (rx, trigger_tx)
    }

    async fn run(self, tx: mpsc::Sender<RefreshMessage>, mut trigger: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                received = trigger.recv() => {
                    if received.is_none() {
                        break;
                    }
                    debug!("Manual refresh requested");
                    ticker.reset();
                }
            }

            if tx.send(RefreshMessage::Loading).await.is_err() {
                break;
            }
            let message = self.load_once().await;
            if tx.send(message).await.is_err() {
                // Main loop is gone
                break;
            }
        }
    }

    async fn load_once(&self) -> RefreshMessage {
        let settings = self.settings.clone();
        match tokio::task::spawn_blocking(move || settings.load()).await {
            Ok(Ok(monitor)) => {
                debug!(
                    entries = monitor.entry_count(),
                    blocks = monitor.session_count(),
                    "Usage data reloaded"
                );
                RefreshMessage::Loaded(monitor)
            }
            Ok(Err(e)) => {
                warn!("Reload failed: {}", e);
                RefreshMessage::Error(e.to_string())
            }
            Err(e) => {
                warn!("Reload task failed: {}", e);
                RefreshMessage::Error(format!("Reload task failed: {}", e))
            }
        }
    }
}
