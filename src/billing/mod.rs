pub mod block;
pub mod calculator;
pub mod pricing;
pub mod types;

pub use block::SessionIdentifier;
pub use calculator::Calculator;
pub use pricing::PricingProvider;
pub use types::{
    BurnLevel, BurnRate, BurnRateThresholds, BurnRateTrend, ClaudePlan, ModelPricing,
    SessionBlock, TokenCounts, UsageEntry, UsageProjection, UsageRecord,
};
