use crate::billing::pricing::PricingProvider;
use crate::billing::{BurnRate, BurnRateTrend, SessionBlock, UsageEntry, UsageProjection};
use chrono::{DateTime, Duration, Utc};

/// Burn rate, projection and aggregate arithmetic over session blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Self
    }

    /// Unweighted burn rate over a block's active span
    pub fn calculate_burn_rate(&self, block: &SessionBlock) -> Option<BurnRate> {
        let total_tokens = block.token_counts().total_tokens() as f64;
        self.burn_rate_from_tokens(block, total_tokens)
    }

    /// Burn rate with each entry scaled by its model weight
    pub fn calculate_weighted_burn_rate(
        &self,
        block: &SessionBlock,
        pricing: &PricingProvider,
    ) -> Option<BurnRate> {
        let weighted_tokens = self.block_weighted_tokens(block, pricing);
        self.burn_rate_from_tokens(block, weighted_tokens)
    }

    fn burn_rate_from_tokens(&self, block: &SessionBlock, tokens: f64) -> Option<BurnRate> {
        if block.is_empty() || block.duration_minutes() <= 0.0 {
            return None;
        }

        let tokens_per_minute = tokens / block.duration_minutes();
        let cost_per_hour = (block.cost_usd() / block.duration_minutes()) * 60.0;

        Some(BurnRate::new(tokens_per_minute, cost_per_hour).with_trend(self.trend(block.entries())))
    }

    /// Compare token volume of the later half of the entries with the earlier half
    fn trend(&self, entries: &[UsageEntry]) -> BurnRateTrend {
        if entries.len() < 2 {
            return BurnRateTrend::Stable;
        }

        let mid_point = entries.len() / 2;
        let first_half: u64 = entries[..mid_point].iter().map(|e| e.total_tokens()).sum();
        let second_half: u64 = entries[mid_point..].iter().map(|e| e.total_tokens()).sum();

        if second_half > first_half {
            BurnRateTrend::Rising
        } else if second_half < first_half {
            BurnRateTrend::Falling
        } else {
            BurnRateTrend::Stable
        }
    }

    pub fn block_weighted_tokens(&self, block: &SessionBlock, pricing: &PricingProvider) -> f64 {
        block
            .entries()
            .iter()
            .map(|entry| self.calculate_weighted_tokens(entry, pricing.model_weight(&entry.model)))
            .sum()
    }

    /// Extrapolate the block's burn rate to its end
    pub fn project_block_usage(
        &self,
        block: &SessionBlock,
        current_time: DateTime<Utc>,
    ) -> Option<UsageProjection> {
        if block.is_empty() || current_time >= block.end_time() {
            return None;
        }

        let burn_rate = self.calculate_burn_rate(block)?;
        let current_tokens = block.token_counts().total_tokens();
        let current_cost = block.cost_usd();

        let remaining_minutes = (block.end_time() - current_time).num_seconds() as f64 / 60.0;
        let remaining_hours = remaining_minutes / 60.0;

        let projected_additional_tokens = (burn_rate.tokens_per_minute * remaining_minutes) as u64;
        let projected_additional_cost = burn_rate.cost_per_hour * remaining_hours;

        Some(UsageProjection::new(
            current_tokens,
            current_cost,
            projected_additional_tokens,
            projected_additional_cost,
        ))
    }

    /// Tokens per minute over the last hour, attributing each block's tokens
    /// proportionally to its overlap with the hour
    pub fn calculate_hourly_burn_rate(
        &self,
        blocks: &[SessionBlock],
        current_time: DateTime<Utc>,
    ) -> f64 {
        self.hourly_rate_with(blocks, current_time, |block| {
            block.token_counts().total_tokens() as f64
        })
    }

    pub fn calculate_weighted_hourly_burn_rate(
        &self,
        blocks: &[SessionBlock],
        current_time: DateTime<Utc>,
        pricing: &PricingProvider,
    ) -> f64 {
        self.hourly_rate_with(blocks, current_time, |block| {
            self.block_weighted_tokens(block, pricing)
        })
    }

    fn hourly_rate_with<F>(&self, blocks: &[SessionBlock], current_time: DateTime<Utc>, tokens: F) -> f64
    where
        F: Fn(&SessionBlock) -> f64,
    {
        let one_hour_ago = current_time - Duration::hours(1);
        let mut total_tokens = 0.0;

        for block in blocks {
            let (Some(block_start), Some(block_end)) = (block.first_activity(), block.last_activity())
            else {
                continue;
            };

            if block_end < one_hour_ago || block_start > current_time {
                continue;
            }

            let overlap_start = block_start.max(one_hour_ago);
            let overlap_end = block_end.min(current_time);
            let overlap_minutes = (overlap_end - overlap_start).num_seconds() as f64 / 60.0;

            if overlap_minutes > 0.0 && block.duration_minutes() > 0.0 {
                total_tokens += tokens(block) * (overlap_minutes / block.duration_minutes());
            }
        }

        total_tokens / 60.0
    }

    pub fn calculate_weighted_tokens(&self, entry: &UsageEntry, model_weight: f64) -> f64 {
        (entry.total_tokens() as f64) * model_weight
    }

    pub fn calculate_total_cost(&self, blocks: &[SessionBlock]) -> f64 {
        blocks.iter().map(|block| block.cost_usd()).sum()
    }

    pub fn calculate_total_tokens(&self, blocks: &[SessionBlock]) -> u64 {
        blocks
            .iter()
            .map(|block| block.token_counts().total_tokens())
            .sum()
    }

    /// Mean of the per-block burn rates
    pub fn calculate_average_burn_rate(&self, blocks: &[SessionBlock]) -> Option<BurnRate> {
        let burn_rates: Vec<BurnRate> = blocks
            .iter()
            .filter_map(|block| self.calculate_burn_rate(block))
            .collect();

        if burn_rates.is_empty() {
            return None;
        }

        let count = burn_rates.len() as f64;
        let avg_tokens_per_minute =
            burn_rates.iter().map(|br| br.tokens_per_minute).sum::<f64>() / count;
        let avg_cost_per_hour = burn_rates.iter().map(|br| br.cost_per_hour).sum::<f64>() / count;

        Some(BurnRate::new(avg_tokens_per_minute, avg_cost_per_hour))
    }

    pub fn calculate_peak_burn_rate(&self, blocks: &[SessionBlock]) -> Option<BurnRate> {
        blocks
            .iter()
            .filter_map(|block| self.calculate_burn_rate(block))
            .max_by(|a, b| a.tokens_per_minute.total_cmp(&b.tokens_per_minute))
    }

    /// Whole minutes until `token_limit` at `current_burn_rate` tokens/minute
    pub fn calculate_time_to_limit(
        &self,
        current_tokens: u64,
        token_limit: u64,
        current_burn_rate: f64,
    ) -> Option<Duration> {
        if current_tokens >= token_limit || current_burn_rate <= 0.0 {
            return None;
        }

        let remaining_tokens = token_limit - current_tokens;
        let minutes_to_limit = remaining_tokens as f64 / current_burn_rate;

        Some(Duration::minutes(minutes_to_limit as i64))
    }
}

/// Format remaining time in human-readable format
pub fn format_remaining_time(minutes: i64) -> String {
    if minutes <= 0 {
        return "expired".to_string();
    }

    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}
