//! Result type for fallback invocations

use serde::{Deserialize, Serialize};

/// Outcome of one top-level fallback invocation.
///
/// Provider-side failures never raise; they end up here with `success =
/// false` and a human-readable message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackResult {
    /// Whether any model in the chain produced a response
    pub success: bool,
    /// Generated text, present iff `success`
    pub response: Option<String>,
    /// Model that produced the response, present iff `success`
    pub model_used: Option<String>,
    /// Retries consumed on the winning (or last losing) model
    pub retry_count: u32,
    /// Terminal error message when every model failed
    pub error_message: Option<String>,
    /// Why a fallback model was used, or why the whole chain failed
    pub fallback_reason: Option<String>,
}

impl FallbackResult {
    /// Successful invocation on `model` after `retry_count` retries.
    pub(crate) fn succeeded(
        response: String,
        model: String,
        retry_count: u32,
        fallback_reason: Option<String>,
    ) -> Self {
        Self {
            success: true,
            response: Some(response),
            model_used: Some(model),
            retry_count,
            error_message: None,
            fallback_reason,
        }
    }

    /// Exhausted invocation: every model in the chain failed or was skipped.
    pub(crate) fn exhausted() -> Self {
        Self {
            success: false,
            response: None,
            model_used: None,
            retry_count: 0,
            error_message: Some("All fallback models failed".to_string()),
            fallback_reason: Some("Exhausted all fallback options".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_result_messages() {
        let result = FallbackResult::exhausted();
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("All fallback models failed")
        );
        assert_eq!(
            result.fallback_reason.as_deref(),
            Some("Exhausted all fallback options")
        );
    }

    #[test]
    fn test_succeeded_result_fields() {
        let result = FallbackResult::succeeded("text".to_string(), "gpt-4o".to_string(), 2, None);
        assert!(result.success);
        assert_eq!(result.model_used.as_deref(), Some("gpt-4o"));
        assert_eq!(result.retry_count, 2);
        assert!(result.error_message.is_none());
    }
}
