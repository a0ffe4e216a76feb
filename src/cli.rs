use crate::billing::ClaudePlan;
use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "claude-usage")]
#[command(version, about = "Claude Code token usage, burn rate and plan limit monitor")]
pub struct Cli {
    /// Subscription plan; remembered in the config file
    #[arg(short = 'p', long = "plan", value_enum)]
    pub plan: Option<ClaudePlan>,

    /// Transcript file or directory (default: auto-discover)
    #[arg(short = 'd', long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Print a text report and exit
    #[arg(long = "report")]
    pub report: bool,

    /// Write loaded usage entries as JSONL and exit
    #[arg(long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Dashboard reload interval
    #[arg(long = "refresh", value_name = "SECS")]
    pub refresh: Option<u64>,

    /// Session block length
    #[arg(long = "session-hours", value_name = "HOURS")]
    pub session_hours: Option<u32>,

    /// Refresh model pricing from LiteLLM before loading
    #[arg(long = "fetch-pricing")]
    pub fetch_pricing: bool,

    /// Verbose logging
    #[arg(long = "debug")]
    pub debug: bool,

    /// Initialize config file
    #[arg(long = "init")]
    pub init: bool,

    /// Print current configuration
    #[arg(long = "print-config")]
    pub print_config: bool,

    /// Check configuration
    #[arg(long = "check-config")]
    pub check_config: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Overlay command line flags on the file configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(plan) = self.plan {
            config.plan = plan;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        if let Some(refresh) = self.refresh {
            config.refresh_interval_secs = refresh;
        }
        if let Some(hours) = self.session_hours {
            config.session_hours = hours;
        }
        if self.fetch_pricing {
            config.fetch_pricing = true;
        }
    }
}
