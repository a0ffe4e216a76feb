//! Claude Code usage monitoring.
//!
//! Reads the JSONL transcripts Claude Code writes under `~/.claude/projects`,
//! groups usage into rolling session blocks and derives burn rates, costs and
//! plan limit projections from them.

pub mod billing;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod report;
#[cfg(feature = "tui")]
pub mod ui;
pub mod utils;

pub use billing::{
    BurnRate, BurnRateTrend, Calculator, ClaudePlan, PricingProvider, SessionBlock,
    SessionIdentifier, UsageEntry, UsageProjection,
};
pub use error::{Result, UsageError};
pub use monitor::{DataSource, LoadSettings, UsageMonitor};

pub mod prelude {
    pub use crate::billing::{BurnRate, ClaudePlan, SessionBlock, UsageEntry, UsageProjection};
    pub use crate::error::{Result, UsageError};
    pub use crate::monitor::{DataSource, LoadSettings, UsageMonitor};
}
