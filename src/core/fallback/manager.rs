//! Fallback manager: the orchestration loop
//!
//! For a logical function, walks its model chain in order. Models whose
//! circuit is open are skipped outright. Each remaining model is attempted up
//! to its retry budget; errors are classified to decide between retrying and
//! advancing the chain. Every terminal outcome is recorded in the usage log.

use crate::config::{FallbackConfig, GatewaySettings};
use crate::core::fallback::circuit_breaker::{CircuitBreakerRegistry, CircuitState};
use crate::core::fallback::classifier;
use crate::core::fallback::retry::RetryPolicy;
use crate::core::fallback::types::FallbackResult;
use crate::core::providers::{AdapterFactory, GenerationOptions, ModelRef};
use crate::usage::{AttemptRecord, CostTable, UsageStore, UsageStatus, UsageTracker};
use crate::utils::error::Result;
use crate::utils::tokens::estimate_tokens;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Chain tried when a function has no configuration of its own.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Orchestrates fallback chains, retries, and circuit breakers for LLM calls.
///
/// Constructed once at startup and shared; all mutable state (the breaker
/// registry) is internally synchronized. There are no process globals: tests
/// and embedders build isolated instances.
pub struct FallbackManager {
    configs: HashMap<String, FallbackConfig>,
    circuit_breaker: CircuitBreakerRegistry,
    retry_policy: RetryPolicy,
    tracker: Arc<UsageTracker>,
    factory: Arc<dyn AdapterFactory>,
}

impl FallbackManager {
    /// Build a manager from validated settings, a usage store, and an adapter
    /// factory.
    pub fn new(
        settings: GatewaySettings,
        store: Arc<dyn UsageStore>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Result<Self> {
        settings.validate()?;

        let tracker = Arc::new(UsageTracker::new(
            store,
            CostTable::new(settings.pricing),
        ));

        Ok(Self {
            configs: settings.fallbacks,
            circuit_breaker: CircuitBreakerRegistry::new(
                settings.circuit_breaker.failure_threshold,
                settings.circuit_breaker.recovery_timeout(),
            ),
            retry_policy: RetryPolicy::new(settings.retries),
            tracker,
            factory,
        })
    }

    /// The fallback chain for a function: primary first, then fallbacks.
    ///
    /// Unconfigured functions get a single-model default chain.
    pub fn fallback_chain(&self, function: &str) -> Vec<ModelRef> {
        match self.configs.get(function) {
            Some(config) => config.chain(),
            None => {
                debug!("no fallback config for '{function}', using default chain");
                vec![ModelRef::openai(DEFAULT_MODEL)]
            }
        }
    }

    /// Execute an LLM call for `function`, falling back across the chain.
    ///
    /// Provider failures never raise: the chain either produces a successful
    /// [`FallbackResult`] or an exhausted one. The only `Err` is a
    /// configuration problem, e.g. the factory cannot build an adapter for a
    /// configured target.
    pub async fn execute_with_fallback(
        &self,
        function: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<FallbackResult> {
        let chain = self.fallback_chain(function);
        let tokens_input = estimate_tokens(prompt);

        for (model_index, target) in chain.iter().enumerate() {
            if self.circuit_breaker.is_open(&target.model) {
                // No attempt, no usage row: the model is known-bad right now.
                debug!("skipping {target}: circuit open");
                continue;
            }

            let retry_config = self.retry_policy.config_for(&target.model).clone();

            for retry_count in 0..=retry_config.max_retries {
                let adapter = self.factory.create(target)?;
                let started = Instant::now();

                match adapter.generate(prompt, &options).await {
                    Ok(response) => {
                        let response_time_ms = started.elapsed().as_millis() as u64;
                        let is_fallback = model_index > 0;

                        self.record_usage(AttemptRecord {
                            provider: target.provider.clone(),
                            model: target.model.clone(),
                            function: function.to_string(),
                            tokens_input,
                            tokens_output: estimate_tokens(&response),
                            response_time_ms,
                            status: UsageStatus::Success,
                            error_message: None,
                            fallback_model: is_fallback.then(|| target.model.clone()),
                            retry_count,
                        })
                        .await;

                        self.circuit_breaker.record_success(&target.model);

                        if is_fallback {
                            info!(
                                "'{function}' answered by fallback model {target} \
                                 after {retry_count} retries"
                            );
                        }

                        return Ok(FallbackResult::succeeded(
                            response,
                            target.model.clone(),
                            retry_count,
                            is_fallback.then(|| format!("Used fallback model {}", target.model)),
                        ));
                    }
                    Err(error) => {
                        let kind = classifier::classify(&error);
                        warn!(
                            "attempt {retry_count} on {target} for '{function}' \
                             failed ({}): {error}",
                            kind.as_str()
                        );

                        if !kind.is_retryable() {
                            // The error says nothing about availability, so a
                            // half-open trial slot is released rather than
                            // resolved.
                            self.circuit_breaker.release_trial(&target.model);
                            break;
                        }

                        if retry_count < retry_config.max_retries {
                            let delay =
                                self.retry_policy.calculate_delay(retry_count, &retry_config);
                            self.retry_policy.wait(delay).await;
                        } else {
                            self.circuit_breaker.record_failure(&target.model);
                            break;
                        }
                    }
                }
            }
        }

        warn!("all fallback models failed for '{function}'");
        self.record_usage(AttemptRecord {
            provider: "openai".to_string(),
            model: "unknown".to_string(),
            function: function.to_string(),
            tokens_input,
            tokens_output: 0,
            response_time_ms: 0,
            status: UsageStatus::Failed,
            error_message: Some("All fallback models failed".to_string()),
            fallback_model: None,
            retry_count: 0,
        })
        .await;

        Ok(FallbackResult::exhausted())
    }

    /// Usage tracker shared with the embedding service.
    pub fn usage(&self) -> Arc<UsageTracker> {
        Arc::clone(&self.tracker)
    }

    /// Circuit breaker state for a model.
    pub fn circuit_state(&self, model: &str) -> CircuitState {
        self.circuit_breaker.state(model)
    }

    /// Consecutive failure count for a model.
    pub fn failure_count(&self, model: &str) -> u32 {
        self.circuit_breaker.failure_count(model)
    }

    /// Manually close a model's circuit.
    pub fn reset_circuit(&self, model: &str) {
        self.circuit_breaker.record_success(model);
    }

    /// The breaker registry, for operational tooling.
    pub fn circuit_breaker(&self) -> &CircuitBreakerRegistry {
        &self.circuit_breaker
    }

    /// A usage-log write must never mask the LLM outcome; failures are
    /// logged and dropped.
    async fn record_usage(&self, record: AttemptRecord) {
        if let Err(error) = self.tracker.log_usage(record).await {
            warn!("failed to persist usage row: {error}");
        }
    }
}
