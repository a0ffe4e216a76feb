use super::types::Config;
use crate::billing::ClaudePlan;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SESSION_HOURS: u32 = crate::billing::block::DEFAULT_SESSION_HOURS as u32;

/// Upper bound for `session_hours` (one year)
pub const MAX_SESSION_HOURS: u32 = 24 * 365;

/// Upper bound for `loader_threads`
pub const MAX_LOADER_THREADS: usize = 64;

impl Default for Config {
    fn default() -> Self {
        Config {
            plan: ClaudePlan::Pro,
            data_dir: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            session_hours: DEFAULT_SESSION_HOURS,
            fetch_pricing: false,
            loader_threads: None,
        }
    }
}
