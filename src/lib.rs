//! # Feedback Gateway
//!
//! Resilient LLM execution for the essay-feedback service: per-function
//! fallback chains, per-model retry with exponential backoff, per-model
//! circuit breakers, and append-only usage and cost tracking.
//!
//! ## Features
//!
//! - **Fallback Chains**: Each logical function (feedback, guidance, ...) has
//!   a primary model and an ordered list of fallbacks
//! - **Retry with Backoff**: Per-model retry budgets with capped exponential
//!   backoff and jitter, slept without blocking the runtime
//! - **Circuit Breakers**: Per-model breakers with a single-trial half-open
//!   recovery phase, shared safely across concurrent requests
//! - **Error Classification**: Substring-based taxonomy deciding which
//!   provider errors are worth retrying
//! - **Usage Tracking**: Every call outcome recorded with token estimates and
//!   USD cost, aggregated on demand into daily and range reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feedback_gateway::{
//!     AdapterError, AdapterFactory, FallbackManager, GatewaySettings,
//!     GenerationOptions, MemoryUsageStore, ModelAdapter, ModelRef,
//! };
//!
//! struct OpenAiFactory;
//!
//! impl AdapterFactory for OpenAiFactory {
//!     fn create(
//!         &self,
//!         target: &ModelRef,
//!     ) -> feedback_gateway::Result<Arc<dyn ModelAdapter>> {
//!         Ok(Arc::new(OpenAiAdapter { model: target.model.clone() }))
//!     }
//! }
//!
//! struct OpenAiAdapter {
//!     model: String,
//! }
//!
//! #[async_trait::async_trait]
//! impl ModelAdapter for OpenAiAdapter {
//!     async fn generate(
//!         &self,
//!         prompt: &str,
//!         _options: &GenerationOptions,
//!     ) -> Result<String, AdapterError> {
//!         // Call your provider here.
//!         Ok(format!("{} says hello to: {prompt}", self.model))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> feedback_gateway::Result<()> {
//!     let settings = GatewaySettings::default();
//!     let store = Arc::new(MemoryUsageStore::new());
//!     let manager = FallbackManager::new(settings, store, Arc::new(OpenAiFactory))?;
//!
//!     let result = manager
//!         .execute_with_fallback("feedback", "Review this essay...", GenerationOptions::default())
//!         .await?;
//!
//!     if result.success {
//!         println!("{}", result.response.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod usage;
pub mod utils;

pub use config::{
    CircuitBreakerSettings, FallbackConfig, GatewaySettings, ModelPrice, RetryConfig,
};
pub use core::fallback::{
    classify, classify_message, CircuitBreakerRegistry, CircuitState, ErrorKind, FallbackManager,
    FallbackResult, RetryPolicy,
};
pub use core::providers::{
    AdapterError, AdapterFactory, GenerationOptions, ModelAdapter, ModelRef,
};
pub use usage::{
    daily_usage, usage_report, AttemptRecord, CostTable, DailyUsage, MemoryUsageStore,
    SqliteUsageStore, TokenUsage, UsageBreakdown, UsageReport, UsageStatus, UsageStore,
    UsageTracker,
};
pub use utils::error::{EngineError, Result};
pub use utils::tokens::estimate_tokens;
