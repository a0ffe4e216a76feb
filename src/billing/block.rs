use crate::billing::{SessionBlock, UsageEntry};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::borrow::Cow;

/// Default rolling session length
pub const DEFAULT_SESSION_HOURS: i64 = 5;

/// Splits a usage timeline into rolling session blocks
#[derive(Debug, Clone)]
pub struct SessionIdentifier {
    session_duration: Duration,
}

impl SessionIdentifier {
    pub fn new() -> Self {
        Self {
            session_duration: Duration::hours(DEFAULT_SESSION_HOURS),
        }
    }

    pub fn with_duration(session_duration: Duration) -> Self {
        Self { session_duration }
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    /// Group entries into blocks.
    ///
    /// A block opens at the hour of its first entry and lasts
    /// `session_duration`. An entry starts a new block when it falls on or
    /// after the current block's end, or when it follows the block's last
    /// entry by at least `session_duration`. Input order does not matter.
    pub fn identify_blocks(&self, entries: &[UsageEntry]) -> Vec<SessionBlock> {
        if entries.is_empty() {
            return Vec::new();
        }

        let ordered: Cow<'_, [UsageEntry]> =
            if entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
                Cow::Borrowed(entries)
            } else {
                let mut sorted = entries.to_vec();
                sorted.sort_by_key(|e| e.timestamp);
                Cow::Owned(sorted)
            };

        let mut blocks = Vec::new();
        let mut current: Option<SessionBlock> = None;

        for entry in ordered.iter() {
            match current.as_mut() {
                Some(block) if !self.should_create_new_block(block, entry) => {
                    block.add_entry(entry.clone());
                }
                _ => {
                    if let Some(finished) = current.take() {
                        blocks.push(finished);
                    }
                    let mut block = self.create_block_for_entry(entry);
                    block.add_entry(entry.clone());
                    current = Some(block);
                }
            }
        }

        if let Some(block) = current {
            blocks.push(block);
        }

        blocks
    }

    fn should_create_new_block(&self, block: &SessionBlock, entry: &UsageEntry) -> bool {
        if entry.timestamp >= block.end_time() {
            return true;
        }

        match block.last_activity() {
            Some(last) => entry.timestamp - last >= self.session_duration,
            None => false,
        }
    }

    fn create_block_for_entry(&self, entry: &UsageEntry) -> SessionBlock {
        let start_time = floor_to_hour(entry.timestamp);
        let end_time = start_time
            .checked_add_signed(self.session_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        SessionBlock::new(start_time, end_time)
    }
}

impl Default for SessionIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor a timestamp down to the nearest hour
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(Duration::hours(1))
        .unwrap_or(timestamp)
}

/// Find the block that is open at `now`
pub fn find_active_block(blocks: &[SessionBlock], now: DateTime<Utc>) -> Option<&SessionBlock> {
    blocks.iter().rev().find(|b| b.is_active_at(now))
}
