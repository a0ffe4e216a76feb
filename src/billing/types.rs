use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Claude subscription plan with its per-block token allowance
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ClaudePlan {
    #[default]
    #[value(name = "pro")]
    Pro,
    #[value(name = "max5")]
    Max5,
    #[value(name = "max20")]
    Max20,
}

impl ClaudePlan {
    pub const ALL: [ClaudePlan; 3] = [ClaudePlan::Pro, ClaudePlan::Max5, ClaudePlan::Max20];

    pub fn max_tokens(&self) -> u64 {
        match self {
            ClaudePlan::Pro => 44_000,
            ClaudePlan::Max5 => 220_000,
            ClaudePlan::Max20 => 880_000,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClaudePlan::Pro => "Claude Pro",
            ClaudePlan::Max5 => "Claude Max 5",
            ClaudePlan::Max20 => "Claude Max 20",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClaudePlan::Pro => "Claude Pro (~44K tokens/day)",
            ClaudePlan::Max5 => "Claude Max 5 (~220K tokens/day)",
            ClaudePlan::Max20 => "Claude Max 20 (~880K tokens/day)",
        }
    }

    /// Identifier used on the command line and in the config file
    pub fn id(&self) -> &'static str {
        match self {
            ClaudePlan::Pro => "pro",
            ClaudePlan::Max5 => "max5",
            ClaudePlan::Max20 => "max20",
        }
    }

    /// Guess the plan from observed usage: the smallest plan not yet exceeded
    pub fn detect(tokens: u64) -> Self {
        if tokens > ClaudePlan::Max5.max_tokens() {
            ClaudePlan::Max20
        } else if tokens > ClaudePlan::Pro.max_tokens() {
            ClaudePlan::Max5
        } else {
            ClaudePlan::Pro
        }
    }
}

impl fmt::Display for ClaudePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ClaudePlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => Ok(ClaudePlan::Pro),
            "max5" => Ok(ClaudePlan::Max5),
            "max20" => Ok(ClaudePlan::Max20),
            other => Err(format!(
                "unknown plan '{}', expected one of: pro, max5, max20",
                other
            )),
        }
    }
}

/// Single usage record extracted from a transcript line
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEntry {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub cost_usd: f64,
    pub session_id: String,
}

impl UsageEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
        cost_usd: f64,
    ) -> Self {
        Self {
            timestamp,
            model: model.into(),
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            cost_usd,
            session_id: "unknown".to_string(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Input plus output tokens; cache traffic is excluded
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn all_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    pub fn to_record(&self) -> UsageRecord {
        UsageRecord {
            timestamp: self.timestamp,
            model: self.model.clone(),
            usage: TokenCounts {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                cache_creation_tokens: self.cache_creation_tokens,
                cache_read_tokens: self.cache_read_tokens,
            },
            cost_usd: self.cost_usd,
            session_id: Some(self.session_id.clone()),
        }
    }
}

/// Token counters aggregated over any number of entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(rename = "cache_creation_input_tokens", default)]
    pub cache_creation_tokens: u64,
    #[serde(rename = "cache_read_input_tokens", default)]
    pub cache_read_tokens: u64,
}

impl TokenCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: &UsageEntry) {
        self.input_tokens += entry.input_tokens;
        self.output_tokens += entry.output_tokens;
        self.cache_creation_tokens += entry.cache_creation_tokens;
        self.cache_read_tokens += entry.cache_read_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn all_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

/// On-disk form of a usage entry, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub usage: TokenCounts,
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Rolling session window and the entries that fall into it
#[derive(Debug, Clone)]
pub struct SessionBlock {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    entries: Vec<UsageEntry>,
    token_counts: TokenCounts,
    cost_usd: f64,
    duration_minutes: f64,
    session_ids: HashSet<String>,
}

impl SessionBlock {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            entries: Vec::new(),
            token_counts: TokenCounts::new(),
            cost_usd: 0.0,
            duration_minutes: 0.0,
            session_ids: HashSet::new(),
        }
    }

    pub fn add_entry(&mut self, entry: UsageEntry) {
        self.token_counts.add_entry(&entry);
        self.cost_usd += entry.cost_usd;
        if !self.session_ids.contains(&entry.session_id) {
            self.session_ids.insert(entry.session_id.clone());
        }
        self.entries.push(entry);
        self.update_duration();
    }

    fn update_duration(&mut self) {
        if let (Some(first), Some(last)) = (self.entries.first(), self.entries.last()) {
            let minutes = (last.timestamp - first.timestamp).num_seconds() as f64 / 60.0;
            // A lone burst still counts as one minute of activity
            self.duration_minutes = if minutes == 0.0 { 1.0 } else { minutes };
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn entries(&self) -> &[UsageEntry] {
        &self.entries
    }

    pub fn token_counts(&self) -> &TokenCounts {
        &self.token_counts
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct transcript sessions contributing to this block
    pub fn session_count(&self) -> usize {
        self.session_ids.len()
    }

    pub fn first_activity(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.timestamp)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_empty() && now >= self.start_time && now < self.end_time
    }

    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        if now >= self.end_time {
            return 0;
        }
        (self.end_time - now).num_minutes()
    }
}

/// Burn rate calculation
#[derive(Debug, Clone, PartialEq)]
pub struct BurnRate {
    pub tokens_per_minute: f64,
    pub cost_per_hour: f64,
    pub trend: BurnRateTrend,
}

impl BurnRate {
    pub fn new(tokens_per_minute: f64, cost_per_hour: f64) -> Self {
        Self {
            tokens_per_minute,
            cost_per_hour,
            trend: BurnRateTrend::Stable,
        }
    }

    pub fn with_trend(mut self, trend: BurnRateTrend) -> Self {
        self.trend = trend;
        self
    }

    pub fn tokens_per_second(&self) -> f64 {
        self.tokens_per_minute / 60.0
    }
}

/// Burn rate trend indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnRateTrend {
    Rising,
    Falling,
    Stable,
}

impl BurnRateTrend {
    pub fn arrow(&self) -> &'static str {
        match self {
            BurnRateTrend::Rising => "↑",
            BurnRateTrend::Falling => "↓",
            BurnRateTrend::Stable => "→",
        }
    }
}

/// Burn rate thresholds for indicator display
#[derive(Debug, Clone, PartialEq)]
pub struct BurnRateThresholds {
    pub high: f64,   // Default 5000 tokens/minute
    pub medium: f64, // Default 2000 tokens/minute
}

impl Default for BurnRateThresholds {
    fn default() -> Self {
        Self {
            high: 5000.0,
            medium: 2000.0,
        }
    }
}

/// Severity bucket for a burn rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnLevel {
    Normal,
    Elevated,
    High,
}

impl BurnRateThresholds {
    /// Create thresholds from environment variables
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("CLAUDE_USAGE_BURN_HIGH").ok().as_deref(),
            std::env::var("CLAUDE_USAGE_BURN_MEDIUM").ok().as_deref(),
        )
    }

    /// Defaults overridden by whichever values parse as finite numbers
    pub fn from_values(high: Option<&str>, medium: Option<&str>) -> Self {
        let parse = |value: Option<&str>| {
            value
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let defaults = Self::default();
        Self {
            high: parse(high).unwrap_or(defaults.high),
            medium: parse(medium).unwrap_or(defaults.medium),
        }
    }

    pub fn classify(&self, tokens_per_minute: f64) -> BurnLevel {
        if tokens_per_minute > self.high {
            BurnLevel::High
        } else if tokens_per_minute > self.medium {
            BurnLevel::Elevated
        } else {
            BurnLevel::Normal
        }
    }
}

/// Projected usage at the end of a session block
#[derive(Debug, Clone, PartialEq)]
pub struct UsageProjection {
    pub current_tokens: u64,
    pub current_cost: f64,
    pub projected_additional_tokens: u64,
    pub projected_additional_cost: f64,
}

impl UsageProjection {
    pub fn new(
        current_tokens: u64,
        current_cost: f64,
        projected_additional_tokens: u64,
        projected_additional_cost: f64,
    ) -> Self {
        Self {
            current_tokens,
            current_cost,
            projected_additional_tokens,
            projected_additional_cost,
        }
    }

    pub fn projected_total_tokens(&self) -> u64 {
        self.current_tokens + self.projected_additional_tokens
    }

    pub fn projected_total_cost(&self) -> f64 {
        self.current_cost + self.projected_additional_cost
    }
}

/// Model pricing information, USD per token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
    pub cache_creation_input_token_cost: f64,
    pub cache_read_input_token_cost: f64,
}

impl ModelPricing {
    /// Build pricing from USD-per-million-token rates
    pub fn per_million(input: f64, output: f64, cache_creation: f64, cache_read: f64) -> Self {
        Self {
            input_cost_per_token: input / 1_000_000.0,
            output_cost_per_token: output / 1_000_000.0,
            cache_creation_input_token_cost: cache_creation / 1_000_000.0,
            cache_read_input_token_cost: cache_read / 1_000_000.0,
        }
    }

    /// Cost of the given token counts, rounded to micro-dollars
    pub fn calculate_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> f64 {
        let cost = (input_tokens as f64 * self.input_cost_per_token)
            + (output_tokens as f64 * self.output_cost_per_token)
            + (cache_creation_tokens as f64 * self.cache_creation_input_token_cost)
            + (cache_read_tokens as f64 * self.cache_read_input_token_cost);

        (cost * 1_000_000.0).round() / 1_000_000.0
    }

    pub fn calculate_entry_cost(&self, entry: &UsageEntry) -> f64 {
        self.calculate_cost(
            entry.input_tokens,
            entry.output_tokens,
            entry.cache_creation_tokens,
            entry.cache_read_tokens,
        )
    }
}
