use crate::billing::ClaudePlan;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::warn;

use super::defaults::{DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SESSION_HOURS};

/// Main config structure, `~/.claude/claude-usage/config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "lenient_plan")]
    pub plan: ClaudePlan,
    /// Transcript file or directory; auto-discovered when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_session_hours")]
    pub session_hours: u32,
    #[serde(default)]
    pub fetch_pricing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_threads: Option<usize>,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_session_hours() -> u32 {
    DEFAULT_SESSION_HOURS
}

/// Unknown plan names fall back to the default plan
fn lenient_plan<'de, D>(deserializer: D) -> Result<ClaudePlan, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|e| {
        warn!("{}; using {}", e, ClaudePlan::default());
        ClaudePlan::default()
    }))
}
