//! Engine configuration
//!
//! All fallback, retry, circuit-breaker, and pricing parameters are supplied
//! at startup and immutable afterwards. Settings load from YAML or fall back
//! to built-in tables covering the four essay-feedback functions and the
//! OpenAI models they run on.

use crate::core::providers::ModelRef;
use crate::utils::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Per-function fallback chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Primary model tried first
    pub primary: ModelRef,
    /// Ordered fallback models tried after the primary
    #[serde(default)]
    pub fallback_chain: Vec<ModelRef>,
    /// Upper bound on retries for any model in this chain
    #[serde(default = "defaults::max_retries")]
    pub max_retries_per_model: u32,
    /// Base retry delay in seconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_seconds: f64,
    /// Maximum retry delay in seconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_seconds: f64,
    /// Whether retry delays grow exponentially
    #[serde(default = "defaults::exponential")]
    pub exponential_backoff: bool,
}

impl FallbackConfig {
    /// Full chain for this function: primary first, fallbacks in order.
    pub fn chain(&self) -> Vec<ModelRef> {
        let mut chain = Vec::with_capacity(1 + self.fallback_chain.len());
        chain.push(self.primary.clone());
        chain.extend(self.fallback_chain.iter().cloned());
        chain
    }
}

/// Per-model retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
    /// Base delay in seconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_seconds: f64,
    /// Cap on the pre-jitter delay in seconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_seconds: f64,
    /// Whether delays grow exponentially
    #[serde(default = "defaults::exponential")]
    pub exponential_backoff: bool,
    /// Informational list of error kinds considered retryable for this model.
    /// The live classifier verdict governs the actual retry decision; this
    /// list is carried for operators reading the configuration.
    #[serde(default)]
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_seconds: defaults::base_delay(),
            max_delay_seconds: defaults::max_delay(),
            exponential_backoff: true,
            retryable_errors: vec![
                "rate_limit".to_string(),
                "timeout".to_string(),
                "service_unavailable".to_string(),
            ],
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before a model's circuit opens
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before permitting a trial call
    #[serde(default = "defaults::recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

impl CircuitBreakerSettings {
    /// Recovery timeout as a duration.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
            recovery_timeout_secs: defaults::recovery_timeout_secs(),
        }
    }
}

/// Price per 1K tokens for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPrice {
    /// USD per 1K input tokens
    pub input_per_1k: f64,
    /// USD per 1K output tokens
    pub output_per_1k: f64,
}

/// Complete engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Fallback chains keyed by function name
    #[serde(default = "default_fallbacks")]
    pub fallbacks: HashMap<String, FallbackConfig>,
    /// Retry configurations keyed by model name; a `"default"` entry covers
    /// models without their own entry
    #[serde(default = "default_retries")]
    pub retries: HashMap<String, RetryConfig>,
    /// Circuit breaker thresholds shared by all models
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Price table keyed by model name; absent models cost zero
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, ModelPrice>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            fallbacks: default_fallbacks(),
            retries: default_retries(),
            circuit_breaker: CircuitBreakerSettings::default(),
            pricing: default_pricing(),
        }
    }
}

impl GatewaySettings {
    /// Load settings from a YAML file and validate them.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string and validate them.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate all parameter bounds.
    pub fn validate(&self) -> Result<()> {
        for (function, config) in &self.fallbacks {
            if config.primary.model.is_empty() {
                return Err(EngineError::Validation(format!(
                    "fallback config for '{function}' has an empty primary model"
                )));
            }
            if config.max_retries_per_model == 0 {
                return Err(EngineError::Validation(format!(
                    "fallback config for '{function}' must allow at least one retry"
                )));
            }
            validate_delays(
                &format!("fallback config for '{function}'"),
                config.base_delay_seconds,
                config.max_delay_seconds,
            )?;
        }

        for (model, config) in &self.retries {
            if config.max_retries == 0 {
                return Err(EngineError::Validation(format!(
                    "retry config for '{model}' must allow at least one retry"
                )));
            }
            validate_delays(
                &format!("retry config for '{model}'"),
                config.base_delay_seconds,
                config.max_delay_seconds,
            )?;
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(EngineError::Validation(
                "circuit breaker failure_threshold must be at least 1".to_string(),
            ));
        }

        for (model, price) in &self.pricing {
            if price.input_per_1k < 0.0 || price.output_per_1k < 0.0 {
                return Err(EngineError::Validation(format!(
                    "pricing for '{model}' must not be negative"
                )));
            }
        }

        Ok(())
    }
}

fn validate_delays(context: &str, base: f64, max: f64) -> Result<()> {
    if !(base > 0.0) {
        return Err(EngineError::Validation(format!(
            "{context} base delay must be positive"
        )));
    }
    if max < base {
        return Err(EngineError::Validation(format!(
            "{context} max delay must be at least the base delay"
        )));
    }
    Ok(())
}

fn default_fallbacks() -> HashMap<String, FallbackConfig> {
    let gpt4o_chain = vec![ModelRef::openai("gpt-4o-mini"), ModelRef::openai("gpt-3.5-turbo")];
    let mini_chain = vec![ModelRef::openai("gpt-3.5-turbo")];

    HashMap::from([
        (
            "ai_detection".to_string(),
            FallbackConfig {
                primary: ModelRef::openai("gpt-4o"),
                fallback_chain: gpt4o_chain.clone(),
                max_retries_per_model: 2,
                base_delay_seconds: 1.0,
                max_delay_seconds: 5.0,
                exponential_backoff: true,
            },
        ),
        (
            "feedback".to_string(),
            FallbackConfig {
                primary: ModelRef::openai("gpt-4o"),
                fallback_chain: gpt4o_chain,
                max_retries_per_model: 3,
                base_delay_seconds: 1.5,
                max_delay_seconds: 8.0,
                exponential_backoff: true,
            },
        ),
        (
            "guidance".to_string(),
            FallbackConfig {
                primary: ModelRef::openai("gpt-4o-mini"),
                fallback_chain: mini_chain.clone(),
                max_retries_per_model: 3,
                base_delay_seconds: 1.0,
                max_delay_seconds: 5.0,
                exponential_backoff: true,
            },
        ),
        (
            "section_check".to_string(),
            FallbackConfig {
                primary: ModelRef::openai("gpt-4o-mini"),
                fallback_chain: mini_chain,
                max_retries_per_model: 3,
                base_delay_seconds: 1.0,
                max_delay_seconds: 5.0,
                exponential_backoff: true,
            },
        ),
    ])
}

fn default_retries() -> HashMap<String, RetryConfig> {
    HashMap::from([
        (
            "gpt-4o".to_string(),
            RetryConfig {
                max_retries: 2,
                base_delay_seconds: 2.0,
                max_delay_seconds: 10.0,
                exponential_backoff: true,
                retryable_errors: vec![
                    "rate_limit".to_string(),
                    "timeout".to_string(),
                    "service_unavailable".to_string(),
                ],
            },
        ),
        (
            "gpt-4o-mini".to_string(),
            RetryConfig {
                max_retries: 3,
                base_delay_seconds: 1.5,
                max_delay_seconds: 8.0,
                exponential_backoff: true,
                retryable_errors: vec![
                    "rate_limit".to_string(),
                    "timeout".to_string(),
                    "service_unavailable".to_string(),
                    "connection_error".to_string(),
                ],
            },
        ),
        (
            "gpt-3.5-turbo".to_string(),
            RetryConfig {
                max_retries: 5,
                base_delay_seconds: 1.0,
                max_delay_seconds: 5.0,
                exponential_backoff: true,
                retryable_errors: vec![
                    "rate_limit".to_string(),
                    "timeout".to_string(),
                    "service_unavailable".to_string(),
                    "connection_error".to_string(),
                    "internal_server_error".to_string(),
                ],
            },
        ),
        // Covers self-hosted models without their own entry
        ("default".to_string(), RetryConfig::default()),
    ])
}

fn default_pricing() -> HashMap<String, ModelPrice> {
    HashMap::from([
        (
            "gpt-4o".to_string(),
            ModelPrice {
                input_per_1k: 0.005,
                output_per_1k: 0.015,
            },
        ),
        (
            "gpt-4o-mini".to_string(),
            ModelPrice {
                input_per_1k: 0.00015,
                output_per_1k: 0.0006,
            },
        ),
        (
            "gpt-4-turbo".to_string(),
            ModelPrice {
                input_per_1k: 0.01,
                output_per_1k: 0.03,
            },
        ),
        (
            "gpt-3.5-turbo".to_string(),
            ModelPrice {
                input_per_1k: 0.0005,
                output_per_1k: 0.0015,
            },
        ),
    ])
}

mod defaults {
    pub(super) fn max_retries() -> u32 {
        3
    }

    pub(super) fn base_delay() -> f64 {
        1.0
    }

    pub(super) fn max_delay() -> f64 {
        5.0
    }

    pub(super) fn exponential() -> bool {
        true
    }

    pub(super) fn failure_threshold() -> u32 {
        5
    }

    pub(super) fn recovery_timeout_secs() -> u64 {
        300
    }
}
