//! Retry policy with exponential backoff and jitter

use crate::config::RetryConfig;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Per-model retry policy.
///
/// Holds the retry configuration table and computes backoff delays. Models
/// without their own entry (e.g. self-hosted ones) use the `"default"` entry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    configs: HashMap<String, RetryConfig>,
}

impl RetryPolicy {
    /// Create a policy from a configuration table.
    ///
    /// A `"default"` entry is inserted if the table lacks one, so lookups can
    /// never miss.
    pub fn new(mut configs: HashMap<String, RetryConfig>) -> Self {
        configs
            .entry("default".to_string())
            .or_insert_with(RetryConfig::default);
        Self { configs }
    }

    /// Retry configuration for a model, falling back to the default entry.
    pub fn config_for(&self, model: &str) -> &RetryConfig {
        self.configs
            .get(model)
            .unwrap_or_else(|| &self.configs["default"])
    }

    /// Compute the delay before retry number `retry_count` (0-based).
    ///
    /// Without exponential backoff the base delay is returned unchanged.
    /// Otherwise the delay doubles per retry, is capped at the configured
    /// maximum, and then gains additive jitter drawn uniformly from
    /// [0.1, 0.3] of the capped delay. The jitter can push the final value
    /// slightly above the cap; desynchronizing concurrent retries matters
    /// more than the exact ceiling.
    pub fn calculate_delay(&self, retry_count: u32, config: &RetryConfig) -> Duration {
        if !config.exponential_backoff {
            return Duration::from_secs_f64(config.base_delay_seconds);
        }

        let exponential = config.base_delay_seconds * 2f64.powi(retry_count as i32);
        let capped = exponential.min(config.max_delay_seconds);
        let jitter = rand::thread_rng().gen_range(0.1..=0.3) * capped;

        Duration::from_secs_f64(capped + jitter)
    }

    /// Wait out a retry delay without blocking the executor.
    pub async fn wait(&self, delay: Duration) {
        debug!("waiting {:?} before retry", delay);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(HashMap::new())
    }

    fn config(base: f64, max: f64, exponential: bool) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_seconds: base,
            max_delay_seconds: max,
            exponential_backoff: exponential,
            retryable_errors: Vec::new(),
        }
    }

    #[test]
    fn test_fixed_delay_ignores_retry_count() {
        let policy = policy();
        let config = config(1.5, 10.0, false);
        for retry_count in 0..6 {
            let delay = policy.calculate_delay(retry_count, &config);
            assert_eq!(delay, Duration::from_secs_f64(1.5));
        }
    }

    #[test]
    fn test_exponential_delay_within_jitter_bounds() {
        let policy = policy();
        let config = config(1.0, 10.0, true);
        for retry_count in 0..5u32 {
            let core = (1.0 * 2f64.powi(retry_count as i32)).min(10.0);
            let delay = policy.calculate_delay(retry_count, &config).as_secs_f64();
            assert!(
                delay >= core * 1.1 - 1e-9 && delay <= core * 1.3 + 1e-9,
                "retry {retry_count}: delay {delay} outside [{}, {}]",
                core * 1.1,
                core * 1.3
            );
        }
    }

    #[test]
    fn test_exponential_delay_capped_before_jitter() {
        let policy = policy();
        let config = config(2.0, 5.0, true);
        // 2 * 2^4 = 32 would exceed the cap; core component must be 5.0
        let delay = policy.calculate_delay(4, &config).as_secs_f64();
        assert!(delay >= 5.0, "delay {delay} below cap");
        assert!(delay <= 5.0 * 1.3 + 1e-9, "delay {delay} above cap plus jitter");
    }

    #[test]
    fn test_unknown_model_uses_default_entry() {
        let policy = policy();
        let config = policy.config_for("llama3.1");
        let default = RetryConfig::default();
        assert_eq!(config.max_retries, default.max_retries);
        assert_eq!(config.base_delay_seconds, default.base_delay_seconds);
    }

    #[test]
    fn test_known_model_uses_its_own_entry() {
        let mut table = HashMap::new();
        table.insert("gpt-4o".to_string(), config(2.0, 10.0, true));
        let policy = RetryPolicy::new(table);
        assert_eq!(policy.config_for("gpt-4o").base_delay_seconds, 2.0);
    }
}
