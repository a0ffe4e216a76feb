use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

use super::ModelPricing;
use crate::error::Result;

/// LiteLLM's model pricing and context window data URL
const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

/// Remote pricing cache, filled by the first successful fetch
static REMOTE_PRICING_CACHE: Lazy<RwLock<Option<HashMap<String, ModelPricing>>>> =
    Lazy::new(|| RwLock::new(None));

/// LiteLLM data format
#[derive(Debug, Clone, Deserialize)]
struct LiteLLMPricing {
    // Optional to tolerate non-text models (e.g., image generation)
    input_cost_per_token: Option<f64>,
    output_cost_per_token: Option<f64>,
    #[serde(default)]
    cache_creation_input_token_cost: Option<f64>,
    #[serde(default)]
    cache_read_input_token_cost: Option<f64>,
}

/// Model pricing table with fuzzy lookup and per-family weights
#[derive(Debug, Clone)]
pub struct PricingProvider {
    pricing: HashMap<String, ModelPricing>,
}

impl PricingProvider {
    pub fn new() -> Self {
        Self {
            pricing: Self::builtin_pricing(),
        }
    }

    /// Provider over an explicit table (no built-in models)
    pub fn from_table(pricing: HashMap<String, ModelPricing>) -> Self {
        Self { pricing }
    }

    /// Built-in pricing data for offline use, USD per million tokens
    fn builtin_pricing() -> HashMap<String, ModelPricing> {
        let opus = ModelPricing::per_million(15.0, 75.0, 18.75, 1.875);
        let sonnet = ModelPricing::per_million(3.0, 15.0, 3.75, 0.3);
        let haiku_3 = ModelPricing::per_million(0.25, 1.25, 0.3, 0.03);
        let haiku_3_5 = ModelPricing::per_million(1.0, 5.0, 1.25, 0.1);

        let mut m = HashMap::new();
        m.insert("claude-3-opus-20240229".to_string(), opus.clone());
        m.insert("claude-opus-4-20250514".to_string(), opus);
        m.insert("claude-3-sonnet-20240229".to_string(), sonnet.clone());
        m.insert("claude-3-5-sonnet-20240620".to_string(), sonnet.clone());
        m.insert("claude-3-5-sonnet-20241022".to_string(), sonnet.clone());
        m.insert("claude-sonnet-4-20250514".to_string(), sonnet);
        m.insert("claude-3-haiku-20240307".to_string(), haiku_3);
        m.insert("claude-3-5-haiku-20241022".to_string(), haiku_3_5);
        m
    }

    /// Built-in table overlaid with LiteLLM's current Claude prices.
    ///
    /// A failed download keeps the built-in table.
    pub async fn with_remote_pricing() -> Self {
        let mut provider = Self::new();
        match Self::fetch_remote().await {
            Ok(remote) => {
                info!("Merged {} remote model prices", remote.len());
                provider.pricing.extend(remote);
            }
            Err(e) => {
                warn!("Failed to fetch pricing from LiteLLM: {}", e);
                warn!("Using built-in pricing data");
            }
        }
        provider
    }

    /// Fetch Claude pricing from LiteLLM (with caching)
    pub async fn fetch_remote() -> Result<HashMap<String, ModelPricing>> {
        if let Ok(guard) = REMOTE_PRICING_CACHE.read() {
            if let Some(cached) = guard.as_ref() {
                return Ok(cached.clone());
            }
        }

        let response = reqwest::get(LITELLM_PRICING_URL)
            .await?
            .error_for_status()?;
        let data: HashMap<String, serde_json::Value> = response.json().await?;
        let pricing = Self::parse_litellm(data);

        if let Ok(mut guard) = REMOTE_PRICING_CACHE.write() {
            *guard = Some(pricing.clone());
        }

        Ok(pricing)
    }

    /// Keep Claude models that carry both input and output token prices
    fn parse_litellm(data: HashMap<String, serde_json::Value>) -> HashMap<String, ModelPricing> {
        let total_models = data.len();
        let mut pricing = HashMap::new();

        for (model_name, value) in data {
            if !model_name.contains("claude") {
                continue;
            }
            // Entries like "sample_spec" have a different shape
            let Ok(litellm) = serde_json::from_value::<LiteLLMPricing>(value) else {
                continue;
            };
            if let (Some(input), Some(output)) =
                (litellm.input_cost_per_token, litellm.output_cost_per_token)
            {
                pricing.insert(
                    model_name,
                    ModelPricing {
                        input_cost_per_token: input,
                        output_cost_per_token: output,
                        cache_creation_input_token_cost: litellm
                            .cache_creation_input_token_cost
                            .unwrap_or(0.0),
                        cache_read_input_token_cost: litellm
                            .cache_read_input_token_cost
                            .unwrap_or(0.0),
                    },
                );
            }
        }

        debug!(
            "LiteLLM: {} total models, {} Claude models with valid pricing",
            total_models,
            pricing.len()
        );

        pricing
    }

    /// Get pricing for a specific model with fuzzy matching
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        if let Some(pricing) = self.pricing.get(model) {
            return Some(pricing);
        }

        let model_lower = model.to_lowercase();
        if model_lower.is_empty() {
            return None;
        }

        // Most specific (longest) overlapping key wins
        self.pricing
            .iter()
            .filter(|(key, _)| {
                let key_lower = key.to_lowercase();
                model_lower.contains(&key_lower) || key_lower.contains(&model_lower)
            })
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, pricing)| pricing)
    }

    pub fn calculate_cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> Option<f64> {
        self.get_pricing(model).map(|pricing| {
            pricing.calculate_cost(
                input_tokens,
                output_tokens,
                cache_creation_tokens,
                cache_read_tokens,
            )
        })
    }

    /// Relative weight of a model against plan limits
    pub fn model_weight(&self, model: &str) -> f64 {
        let model = model.to_lowercase();
        if model.contains("opus") {
            5.0
        } else if model.contains("haiku") {
            0.2
        } else {
            1.0
        }
    }

    pub fn supported_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.pricing.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

impl Default for PricingProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear the remote pricing cache (useful for testing)
pub fn clear_remote_pricing_cache() {
    if let Ok(mut guard) = REMOTE_PRICING_CACHE.write() {
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_lookup() {
        let provider = PricingProvider::new();
        let pricing = provider.get_pricing("claude-3-opus-20240229").unwrap();
        assert!((pricing.input_cost_per_token - 15.0e-6).abs() < 1e-15);
        assert!((pricing.output_cost_per_token - 75.0e-6).abs() < 1e-15);
    }

    #[test]
    fn test_fuzzy_lookup_prefers_longest_key() {
        let mut table = HashMap::new();
        table.insert(
            "claude-3-5-sonnet".to_string(),
            ModelPricing::per_million(3.0, 15.0, 0.0, 0.0),
        );
        table.insert(
            "claude-3-5-sonnet-20241022".to_string(),
            ModelPricing::per_million(4.0, 16.0, 0.0, 0.0),
        );
        let provider = PricingProvider::from_table(table);

        let pricing = provider
            .get_pricing("anthropic/claude-3-5-sonnet-20241022-v2")
            .unwrap();
        assert!((pricing.input_cost_per_token - 4.0e-6).abs() < 1e-15);
        assert!(provider.get_pricing("gpt-4o").is_none());
        assert!(provider.get_pricing("").is_none());
    }

    #[test]
    fn test_calculate_cost() {
        let provider = PricingProvider::new();
        let cost = provider
            .calculate_cost("claude-sonnet-4-20250514", 1_000_000, 0, 0, 0)
            .unwrap();
        assert!((cost - 3.0).abs() < 1e-9);
        assert!(provider
            .calculate_cost("unknown-model", 10, 10, 0, 0)
            .is_none());
    }

    #[test]
    fn test_model_weights() {
        let provider = PricingProvider::new();
        assert_eq!(provider.model_weight("claude-opus-4-20250514"), 5.0);
        assert_eq!(provider.model_weight("claude-3-5-sonnet-20241022"), 1.0);
        assert_eq!(provider.model_weight("claude-3-haiku-20240307"), 0.2);
        assert_eq!(provider.model_weight("mystery"), 1.0);
    }

    #[test]
    fn test_supported_models_sorted() {
        let provider = PricingProvider::new();
        let models = provider.supported_models();
        assert_eq!(models.len(), 8);
        let mut sorted = models.clone();
        sorted.sort();
        assert_eq!(models, sorted);
    }

    #[test]
    fn test_parse_litellm_filters_models() {
        let mut data = HashMap::new();
        data.insert(
            "claude-opus-4-1".to_string(),
            json!({
                "input_cost_per_token": 1.5e-5,
                "output_cost_per_token": 7.5e-5,
                "cache_read_input_token_cost": 1.5e-6,
                "max_tokens": 32000
            }),
        );
        data.insert(
            "claude-image-thing".to_string(),
            json!({ "output_cost_per_image": 0.04 }),
        );
        data.insert(
            "gpt-4o".to_string(),
            json!({ "input_cost_per_token": 2.5e-6, "output_cost_per_token": 1e-5 }),
        );
        data.insert("sample_spec".to_string(), json!({ "max_tokens": "set" }));

        let parsed = PricingProvider::parse_litellm(data);
        assert_eq!(parsed.len(), 1);
        let opus = &parsed["claude-opus-4-1"];
        assert_eq!(opus.cache_creation_input_token_cost, 0.0);
        assert!((opus.cache_read_input_token_cost - 1.5e-6).abs() < 1e-15);
    }
}
