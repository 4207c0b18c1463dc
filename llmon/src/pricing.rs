//! Per-model token pricing.
//!
//! Rates are published per million tokens and stored per token. A [`PricingTable`] is an
//! immutable value: it is built once from configuration and shared by reference, so tests can
//! hand the engine a table of their own.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::PricingConfig;

/// Input and output rate for one model, in USD per token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_per_token: Decimal,
    pub output_per_token: Decimal,
}

impl ModelPricing {
    /// Build from USD per million tokens, the unit providers publish
    pub fn from_per_million(input: Decimal, output: Decimal) -> Self {
        let million = Decimal::from(1_000_000);
        Self {
            input_per_token: input / million,
            output_per_token: output / million,
        }
    }
}

/// Built-in rates in USD per million tokens: (model, input, output)
fn default_rates() -> [(&'static str, Decimal, Decimal); 13] {
    [
        ("gpt-4", Decimal::new(30, 0), Decimal::new(60, 0)),
        ("gpt-4-32k", Decimal::new(60, 0), Decimal::new(120, 0)),
        ("gpt-4-turbo", Decimal::new(10, 0), Decimal::new(30, 0)),
        ("gpt-4-turbo-preview", Decimal::new(10, 0), Decimal::new(30, 0)),
        ("gpt-4-mini", Decimal::new(15, 2), Decimal::new(60, 2)),
        ("gpt-3.5-turbo", Decimal::new(50, 2), Decimal::new(150, 2)),
        ("gpt-3.5-turbo-16k", Decimal::new(3, 0), Decimal::new(4, 0)),
        ("claude-3-opus", Decimal::new(15, 0), Decimal::new(75, 0)),
        ("claude-3-sonnet", Decimal::new(3, 0), Decimal::new(15, 0)),
        ("claude-3-haiku", Decimal::new(25, 2), Decimal::new(125, 2)),
        ("claude-sonnet-4", Decimal::new(3, 0), Decimal::new(15, 0)),
        ("claude-3-5-sonnet", Decimal::new(3, 0), Decimal::new(15, 0)),
        ("claude-3-5-haiku", Decimal::new(80, 2), Decimal::new(4, 0)),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingTable {
    rates: BTreeMap<String, ModelPricing>,
    prefix_match: bool,
}

impl PricingTable {
    /// An empty table: every model is unpriced
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rates, exact-match lookup
    pub fn builtin() -> Self {
        let rates = default_rates()
            .into_iter()
            .map(|(model, input, output)| (model.to_string(), ModelPricing::from_per_million(input, output)))
            .collect();
        Self {
            rates,
            prefix_match: false,
        }
    }

    /// Built-in rates (unless disabled) overlaid with configured entries
    pub fn from_config(config: &PricingConfig) -> Self {
        let mut table = if config.include_defaults { Self::builtin() } else { Self::empty() };
        for (model, rate) in &config.models {
            debug!(model = %model, "Applying configured pricing");
            table = table.with_rate(model.clone(), ModelPricing::from_per_million(rate.input_per_million, rate.output_per_million));
        }
        table.with_prefix_match(config.prefix_match)
    }

    pub fn with_rate(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.rates.insert(model.into(), pricing);
        self
    }

    /// Fall back to the longest table key that prefixes the model name
    pub fn with_prefix_match(mut self, enabled: bool) -> Self {
        self.prefix_match = enabled;
        self
    }

    /// Rates for `model`, `None` when it is unpriced
    pub fn rate_for(&self, model: &str) -> Option<ModelPricing> {
        if let Some(pricing) = self.rates.get(model) {
            return Some(*pricing);
        }
        if !self.prefix_match {
            return None;
        }
        self.rates
            .iter()
            .filter(|(key, _)| model.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pricing)| *pricing)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
