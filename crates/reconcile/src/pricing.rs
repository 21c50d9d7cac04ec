//! Built-in pricing table for common consolidation models.
//!
//! Prices are in USD per 1 million tokens. Custom pricing from the
//! `custom_pricing` config table overrides the built-ins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use timegap_config::PricingOverrideConfig;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Pricing lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

const PROVIDER_PREFIXES: &[&str] = &["openai", "anthropic", "google", "mistral", "deepseek"];

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── OpenAI ─────────────────────────────────────────────────
        prices.insert("openai/gpt-5".into(), ModelPricing::new(1.25, 10.0));
        prices.insert("openai/gpt-5-mini".into(), ModelPricing::new(0.25, 2.0));
        prices.insert("openai/gpt-5-nano".into(), ModelPricing::new(0.05, 0.4));
        prices.insert("openai/gpt-4.1".into(), ModelPricing::new(2.0, 8.0));
        prices.insert("openai/gpt-4.1-mini".into(), ModelPricing::new(0.4, 1.6));
        prices.insert("openai/gpt-4.1-nano".into(), ModelPricing::new(0.1, 0.4));
        prices.insert("openai/gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("openai/gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("openai/o3-mini".into(), ModelPricing::new(1.1, 4.4));

        // ── Anthropic ──────────────────────────────────────────────
        prices.insert(
            "anthropic/claude-sonnet-4".into(),
            ModelPricing::new(3.0, 15.0),
        );
        prices.insert(
            "anthropic/claude-3.5-haiku".into(),
            ModelPricing::new(0.8, 4.0),
        );

        // ── Google ─────────────────────────────────────────────────
        prices.insert(
            "google/gemini-2.0-flash".into(),
            ModelPricing::new(0.1, 0.4),
        );
        prices.insert("google/gemini-1.5-pro".into(), ModelPricing::new(1.25, 5.0));

        // ── Others ─────────────────────────────────────────────────
        prices.insert("mistral/mistral-small".into(), ModelPricing::new(0.2, 0.6));
        prices.insert("deepseek/deepseek-v3".into(), ModelPricing::new(0.27, 1.1));

        Self { prices }
    }

    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Built-ins plus the configured overrides.
    pub fn with_overrides(overrides: &HashMap<String, PricingOverrideConfig>) -> Self {
        let mut table = Self::with_defaults();
        for (model, p) in overrides {
            table.set(model.clone(), ModelPricing::new(p.input_per_m, p.output_per_m));
        }
        table
    }

    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Find pricing for a model.
    ///
    /// Tries an exact match, then the common provider prefixes
    /// (`gpt-4o` → `openai/gpt-4o`), then the longest known model whose
    /// bare name prefixes the requested one (`gpt-5-nano-2025-08-07`
    /// matches `gpt-5-nano`).
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        for prefix in PROVIDER_PREFIXES {
            if let Some(p) = self.prices.get(&format!("{prefix}/{model}")) {
                return Some(*p);
            }
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        self.prices
            .iter()
            .filter_map(|(key, pricing)| {
                let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
                bare_model
                    .starts_with(&bare_key)
                    .then_some((bare_key.len(), *pricing))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, pricing)| pricing)
    }

    /// Cost of sending `input_tokens`, or `None` for an unknown model.
    pub fn input_cost(&self, model: &str, input_tokens: usize) -> Option<f64> {
        self.get(model).map(|p| p.cost(input_tokens, 0))
    }

    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_priced() {
        let table = PricingTable::with_defaults();
        let p = table.get("gpt-5-nano").unwrap();
        assert!((p.input_per_m - 0.05).abs() < 1e-10);
    }

    #[test]
    fn longest_prefix_wins() {
        let table = PricingTable::with_defaults();
        // Must not fall back to plain gpt-5
        let p = table.get("gpt-5-nano-2025-08-07").unwrap();
        assert!((p.input_per_m - 0.05).abs() < 1e-10);
        let p = table.get("openai/gpt-5-2025-08-07").unwrap();
        assert!((p.input_per_m - 1.25).abs() < 1e-10);
    }

    #[test]
    fn unknown_model_has_no_price() {
        let table = PricingTable::with_defaults();
        assert!(table.get("local/llama-hobby").is_none());
        assert!(table.input_cost("local/llama-hobby", 1000).is_none());
    }

    #[test]
    fn overrides_replace_and_extend() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "local/llama-hobby".to_string(),
            PricingOverrideConfig {
                input_per_m: 1.0,
                output_per_m: 2.0,
            },
        );
        overrides.insert(
            "openai/gpt-4o".to_string(),
            PricingOverrideConfig {
                input_per_m: 5.0,
                output_per_m: 20.0,
            },
        );
        let table = PricingTable::with_overrides(&overrides);

        let cost = table.input_cost("local/llama-hobby", 1_000_000).unwrap();
        assert!((cost - 1.0).abs() < 1e-10);
        let cost = table.input_cost("gpt-4o", 1_000_000).unwrap();
        assert!((cost - 5.0).abs() < 1e-10);
    }

    #[test]
    fn model_pricing_cost() {
        let p = ModelPricing::new(5.0, 15.0);
        // (500*5 + 200*15) / 1M
        assert!((p.cost(500, 200) - 0.0055).abs() < 1e-10);
    }

    #[test]
    fn empty_table() {
        let mut table = PricingTable::empty();
        assert!(table.is_empty());
        table.set("custom/model", ModelPricing::new(1.0, 2.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.models(), vec!["custom/model".to_string()]);
    }
}
