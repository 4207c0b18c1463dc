//! Per-call cost from token counts.

use rust_decimal::Decimal;

use crate::pricing::PricingTable;

/// Cost in USD of one call, `None` when the model has no pricing entry.
///
/// Computed exactly: `prompt_tokens * input_rate + completion_tokens * output_rate` with no
/// rounding. Counts are not validated here; ingestion rejects negative values before pricing.
pub fn compute_cost(pricing: &PricingTable, model: &str, prompt_tokens: i64, completion_tokens: i64) -> Option<Decimal> {
    let rate = pricing.rate_for(model)?;
    Some(Decimal::from(prompt_tokens) * rate.input_per_token + Decimal::from(completion_tokens) * rate.output_per_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pricing::ModelPricing, test_utils::dec};

    #[test]
    fn test_gpt4_example() {
        let cost = compute_cost(&PricingTable::builtin(), "gpt-4", 1000, 500);
        assert_eq!(cost, Some(dec("0.06")));
    }

    #[test]
    fn test_unknown_model_is_unpriced() {
        let table = PricingTable::builtin();
        for (prompt, completion) in [(0, 0), (1, 0), (1_000_000, 1_000_000)] {
            assert_eq!(compute_cost(&table, "my-finetune", prompt, completion), None);
        }
    }

    #[test]
    fn test_zero_tokens_cost_nothing() {
        assert_eq!(compute_cost(&PricingTable::builtin(), "claude-3-opus", 0, 0), Some(Decimal::ZERO));
    }

    #[test]
    fn test_cost_is_linear_in_each_count() {
        let table = PricingTable::builtin();
        for model in ["gpt-4", "gpt-4-mini", "claude-3-haiku", "claude-3-5-haiku"] {
            let base = compute_cost(&table, model, 1234, 567).unwrap();
            let doubled = compute_cost(&table, model, 2468, 1134).unwrap();
            assert_eq!(doubled, base * Decimal::TWO, "{model}");

            let prompt_only = compute_cost(&table, model, 1234, 0).unwrap();
            let completion_only = compute_cost(&table, model, 0, 567).unwrap();
            assert_eq!(base, prompt_only + completion_only, "{model}");
        }
    }

    #[test]
    fn test_cost_is_monotone() {
        let table = PricingTable::builtin();
        let mut previous = Decimal::ZERO;
        for tokens in [0, 1, 10, 999, 1_000_000] {
            let by_prompt = compute_cost(&table, "claude-3-sonnet", tokens, 0).unwrap();
            let by_completion = compute_cost(&table, "claude-3-sonnet", 0, tokens).unwrap();
            assert!(by_prompt >= previous);
            assert!(by_completion >= by_prompt);
            previous = by_prompt;
        }
    }

    #[test]
    fn test_small_rates_keep_precision() {
        // 1 token at 0.15 per million must not vanish
        let cost = compute_cost(&PricingTable::builtin(), "gpt-4-mini", 1, 0).unwrap();
        assert_eq!(cost, dec("0.00000015"));
    }

    #[test]
    fn test_custom_table() {
        let table = PricingTable::empty().with_rate("local", ModelPricing::from_per_million(dec("2"), dec("4")));
        assert_eq!(compute_cost(&table, "local", 500_000, 250_000), Some(dec("2")));
        assert_eq!(compute_cost(&table, "gpt-4", 1, 1), None);
    }
}
