//! End-to-end tests for the fallback execution engine, driven by scripted
//! adapters instead of live providers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use feedback_gateway::{
    AdapterError, AdapterFactory, CircuitState, EngineError, FallbackConfig, FallbackManager,
    GatewaySettings, GenerationOptions, MemoryUsageStore, ModelAdapter, ModelRef, Result,
    RetryConfig, UsageStatus,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted step for a model: either a response or a raw error message
/// fed through the classifier.
#[derive(Clone)]
enum Step {
    Ok(&'static str),
    Err(&'static str),
}

/// Shared per-model scripts and attempt counters.
#[derive(Default)]
struct Script {
    steps: Mutex<HashMap<String, Vec<Step>>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Script {
    fn set(&self, model: &str, steps: Vec<Step>) {
        self.steps.lock().insert(model.to_string(), steps);
    }

    fn attempts(&self, model: &str) -> u32 {
        self.attempts.lock().get(model).copied().unwrap_or(0)
    }

    fn next(&self, model: &str) -> Step {
        *self.attempts.lock().entry(model.to_string()).or_insert(0) += 1;
        let mut steps = self.steps.lock();
        match steps.get_mut(model) {
            // The last step repeats once the script runs out
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => Step::Err("no script for this model"),
        }
    }
}

struct ScriptedAdapter {
    model: String,
    script: Arc<Script>,
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> std::result::Result<String, AdapterError> {
        match self.script.next(&self.model) {
            Step::Ok(response) => Ok(response.to_string()),
            Step::Err(message) => Err(AdapterError::Other(message.to_string())),
        }
    }
}

struct ScriptedFactory {
    script: Arc<Script>,
    broken_model: Option<String>,
}

impl AdapterFactory for ScriptedFactory {
    fn create(&self, target: &ModelRef) -> Result<Arc<dyn ModelAdapter>> {
        if self.broken_model.as_deref() == Some(target.model.as_str()) {
            return Err(EngineError::Config(format!(
                "no adapter registered for {target}"
            )));
        }
        Ok(Arc::new(ScriptedAdapter {
            model: target.model.clone(),
            script: Arc::clone(&self.script),
        }))
    }
}

/// Two-model chain for a single "review" function with millisecond delays.
fn two_model_settings() -> GatewaySettings {
    let mut settings = GatewaySettings::default();
    settings.fallbacks = HashMap::from([(
        "review".to_string(),
        FallbackConfig {
            primary: ModelRef::openai("model-a"),
            fallback_chain: vec![ModelRef::openai("model-b")],
            max_retries_per_model: 2,
            base_delay_seconds: 0.001,
            max_delay_seconds: 0.002,
            exponential_backoff: true,
        },
    )]);
    settings.retries = HashMap::from([
        ("model-a".to_string(), fast_retry(2)),
        ("model-b".to_string(), fast_retry(2)),
        ("default".to_string(), fast_retry(1)),
    ]);
    settings
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay_seconds: 0.001,
        max_delay_seconds: 0.002,
        exponential_backoff: true,
        retryable_errors: vec!["rate_limit".to_string()],
    }
}

fn build_manager(
    settings: GatewaySettings,
    script: Arc<Script>,
) -> (FallbackManager, Arc<MemoryUsageStore>) {
    let store = Arc::new(MemoryUsageStore::new());
    let factory = Arc::new(ScriptedFactory {
        script,
        broken_model: None,
    });
    let manager = FallbackManager::new(settings, store.clone(), factory)
        .expect("settings should validate");
    (manager, store)
}

#[tokio::test]
async fn primary_success_never_touches_fallbacks() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Ok("primary answer")]);
    let (manager, store) = build_manager(two_model_settings(), script.clone());

    let result = manager
        .execute_with_fallback("review", "some essay", GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.response.as_deref(), Some("primary answer"));
    assert_eq!(result.model_used.as_deref(), Some("model-a"));
    assert_eq!(result.retry_count, 0);
    assert!(result.fallback_reason.is_none());
    assert_eq!(script.attempts("model-a"), 1);
    assert_eq!(script.attempts("model-b"), 0);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, UsageStatus::Success);
    assert_eq!(rows[0].model, "model-a");
    assert!(rows[0].fallback_model.is_none());
}

#[tokio::test]
async fn retryable_error_retries_before_succeeding() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set(
        "model-a",
        vec![Step::Err("rate limit exceeded"), Step::Ok("second try")],
    );
    let (manager, _store) = build_manager(two_model_settings(), script.clone());

    let result = manager
        .execute_with_fallback("review", "essay", GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.model_used.as_deref(), Some("model-a"));
    assert_eq!(result.retry_count, 1);
    assert_eq!(script.attempts("model-a"), 2);
    // A success resets the consecutive failure count
    assert_eq!(manager.failure_count("model-a"), 0);
}

#[tokio::test]
async fn non_retryable_error_advances_without_retrying() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Err("invalid api key")]);
    script.set("model-b", vec![Step::Ok("fallback answer")]);
    let (manager, store) = build_manager(two_model_settings(), script.clone());

    let result = manager
        .execute_with_fallback("review", "essay", GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.model_used.as_deref(), Some("model-b"));
    assert_eq!(result.retry_count, 0);
    assert_eq!(
        result.fallback_reason.as_deref(),
        Some("Used fallback model model-b")
    );
    // One attempt only, and no breaker penalty for a config-class error
    assert_eq!(script.attempts("model-a"), 1);
    assert_eq!(manager.failure_count("model-a"), 0);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model, "model-b");
    assert_eq!(rows[0].fallback_model.as_deref(), Some("model-b"));
}

#[tokio::test]
async fn exhausted_chain_logs_one_failed_row() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Err("rate limit exceeded")]);
    script.set("model-b", vec![Step::Err("connection refused")]);
    let (manager, store) = build_manager(two_model_settings(), script.clone());

    let result = manager
        .execute_with_fallback("review", "essay", GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("All fallback models failed")
    );
    assert_eq!(
        result.fallback_reason.as_deref(),
        Some("Exhausted all fallback options")
    );

    // Each model burns its full retry budget: initial attempt + 2 retries
    assert_eq!(script.attempts("model-a"), 3);
    assert_eq!(script.attempts("model-b"), 3);
    // Retry exhaustion counts as exactly one breaker failure per model
    assert_eq!(manager.failure_count("model-a"), 1);
    assert_eq!(manager.failure_count("model-b"), 1);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, UsageStatus::Failed);
    assert_eq!(rows[0].model, "unknown");
    assert_eq!(rows[0].provider, "openai");
    assert_eq!(
        rows[0].error_message.as_deref(),
        Some("All fallback models failed")
    );
}

#[tokio::test]
async fn open_circuit_skips_model_entirely() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Ok("should never run")]);
    script.set("model-b", vec![Step::Ok("fallback answer")]);
    let (manager, store) = build_manager(two_model_settings(), script.clone());

    for _ in 0..5 {
        manager.circuit_breaker().record_failure("model-a");
    }
    assert_eq!(manager.circuit_state("model-a"), CircuitState::Open);

    let result = manager
        .execute_with_fallback("review", "essay", GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.model_used.as_deref(), Some("model-b"));
    // The skipped model is never attempted and leaves no usage row
    assert_eq!(script.attempts("model-a"), 0);
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model, "model-b");

    manager.reset_circuit("model-a");
    assert_eq!(manager.circuit_state("model-a"), CircuitState::Closed);
}

#[tokio::test]
async fn unknown_function_falls_back_to_default_chain() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("gpt-4o-mini", vec![Step::Ok("default answer")]);
    let (manager, _store) = build_manager(two_model_settings(), script.clone());

    let chain = manager.fallback_chain("no_such_function");
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].model, "gpt-4o-mini");

    let result = manager
        .execute_with_fallback("no_such_function", "essay", GenerationOptions::default())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.model_used.as_deref(), Some("gpt-4o-mini"));
}

#[tokio::test]
async fn missing_adapter_is_a_configuration_error() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Ok("unused")]);
    let store = Arc::new(MemoryUsageStore::new());
    let factory = Arc::new(ScriptedFactory {
        script,
        broken_model: Some("model-a".to_string()),
    });
    let manager =
        FallbackManager::new(two_model_settings(), store, factory).expect("settings valid");

    let error = manager
        .execute_with_fallback("review", "essay", GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::Config(_)));
}

#[tokio::test]
async fn feedback_function_recovers_via_fallback_model() {
    init_tracing();
    let mut settings = GatewaySettings::default();
    for config in settings.fallbacks.values_mut() {
        config.base_delay_seconds = 0.001;
        config.max_delay_seconds = 0.002;
    }
    for config in settings.retries.values_mut() {
        config.base_delay_seconds = 0.001;
        config.max_delay_seconds = 0.002;
    }

    let script = Arc::new(Script::default());
    script.set("gpt-4o", vec![Step::Err("rate limit exceeded")]);
    script.set("gpt-4o-mini", vec![Step::Ok("feedback body")]);
    let (manager, store) = build_manager(settings, script.clone());

    let result = manager
        .execute_with_fallback("feedback", "Review this essay...", GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.model_used.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(result.retry_count, 0);
    assert_eq!(
        result.fallback_reason.as_deref(),
        Some("Used fallback model gpt-4o-mini")
    );
    // gpt-4o's budget is 2 retries: 3 attempts, then one breaker failure
    assert_eq!(script.attempts("gpt-4o"), 3);
    assert_eq!(manager.failure_count("gpt-4o"), 1);
    assert_eq!(script.attempts("gpt-3.5-turbo"), 0);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model, "gpt-4o-mini");
    assert_eq!(rows[0].fallback_model.as_deref(), Some("gpt-4o-mini"));
    assert!(rows[0].cost_usd > 0.0);
}

#[tokio::test]
async fn usage_report_reflects_mixed_outcomes() {
    init_tracing();
    let script = Arc::new(Script::default());
    script.set("model-a", vec![Step::Ok("fine")]);
    let (manager, _store) = build_manager(two_model_settings(), script.clone());

    manager
        .execute_with_fallback("review", "essay one", GenerationOptions::default())
        .await
        .unwrap();

    // Second call exhausts both models
    script.set("model-a", vec![Step::Err("rate limit exceeded")]);
    script.set("model-b", vec![Step::Err("service unavailable")]);
    manager
        .execute_with_fallback("review", "essay two", GenerationOptions::default())
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let report = manager
        .usage()
        .usage_report(today, today, None, None)
        .await
        .unwrap();

    assert_eq!(report.total_calls, 2);
    assert!((report.success_rate - 50.0).abs() < 1e-9);
    assert_eq!(report.fallback_rate, 0.0);
    assert!(report.usage_by_function.contains_key("review"));

    let daily = manager.usage().daily_usage(today, None).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].call_count, 2);
    assert_eq!(daily[0].success_count, 1);
    assert_eq!(daily[0].failure_count, 1);
}
