//! Cost calculation from the static per-model price table

use crate::config::ModelPrice;
use std::collections::HashMap;

/// Per-model price table.
///
/// Models absent from the table (self-hosted backends, typically) price at
/// zero. Costs are estimates for budgeting, not billing-grade figures.
#[derive(Debug, Clone)]
pub struct CostTable {
    prices: HashMap<String, ModelPrice>,
}

impl CostTable {
    /// Create a table from configuration.
    pub fn new(prices: HashMap<String, ModelPrice>) -> Self {
        Self { prices }
    }

    /// Cost in USD for one call.
    pub fn calculate(&self, model: &str, tokens_input: u64, tokens_output: u64) -> f64 {
        match self.prices.get(model) {
            Some(price) => {
                let input_cost = tokens_input as f64 / 1000.0 * price.input_per_1k;
                let output_cost = tokens_output as f64 / 1000.0 * price.output_per_1k;
                input_cost + output_cost
            }
            None => 0.0,
        }
    }

    /// The full price table, e.g. for a pricing status endpoint.
    pub fn prices(&self) -> &HashMap<String, ModelPrice> {
        &self.prices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySettings;

    fn table() -> CostTable {
        CostTable::new(GatewaySettings::default().pricing)
    }

    #[test]
    fn test_known_model_cost() {
        let cost = table().calculate("gpt-4o", 1000, 2000);
        // 1.0 * 0.005 + 2.0 * 0.015
        assert!((cost - 0.035).abs() < 1e-12);
    }

    #[test]
    fn test_fractional_thousands() {
        let cost = table().calculate("gpt-3.5-turbo", 500, 100);
        // 0.5 * 0.0005 + 0.1 * 0.0015
        assert!((cost - 0.0004).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_is_free() {
        assert_eq!(table().calculate("llama3.1", 10_000, 10_000), 0.0);
    }

    #[test]
    fn test_zero_tokens_zero_cost() {
        assert_eq!(table().calculate("gpt-4o", 0, 0), 0.0);
    }
}
