//! Model adapter boundary
//!
//! The fallback engine never talks to network transport directly. Callers
//! supply an [`AdapterFactory`] that builds a [`ModelAdapter`] for a given
//! provider/model pair; the engine drives `generate` calls through it and
//! classifies the errors it returns.

use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A validated provider/model pair.
///
/// Configuration carries these as a tagged pair rather than a
/// `"provider:model"` string, so a model name containing a colon can never be
/// misread as a provider override.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider name, e.g. `"openai"` or `"ollama"`
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name, e.g. `"gpt-4o-mini"`
    pub model: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl ModelRef {
    /// Create a model reference for the default provider (`openai`).
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            model: model.into(),
        }
    }

    /// Create a model reference with an explicit provider.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Generation parameters forwarded to the adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    pub num_predict: Option<u32>,
}

/// Provider-side call failure.
///
/// The error classifier only inspects the `Display` text of these values, so
/// adapters are free to embed provider-specific detail in the message.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Transport-level failure before a response was received
    #[error("connection error: {0}")]
    Connection(String),

    /// The request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider answered with an error status
    #[error("provider returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Provider error body or reason phrase
        message: String,
    },

    /// The provider answered but the payload could not be decoded
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),

    /// Any other provider-side failure
    #[error("{0}")]
    Other(String),
}

/// Capability exposed by a single provider/model backend.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Generate text for a prompt.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, AdapterError>;
}

/// Factory building adapters for the fallback chain.
///
/// Supplied by the embedding service at engine construction. A factory that
/// cannot build an adapter for a configured target should return
/// [`EngineError::Config`](crate::EngineError::Config); that is the one error
/// the fallback loop propagates instead of converting into a failed result.
pub trait AdapterFactory: Send + Sync {
    /// Build (or reuse) an adapter for the given target.
    fn create(&self, target: &ModelRef) -> Result<Arc<dyn ModelAdapter>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_display() {
        let target = ModelRef::openai("gpt-4o");
        assert_eq!(target.to_string(), "openai/gpt-4o");
    }

    #[test]
    fn test_model_ref_default_provider_from_yaml() {
        let target: ModelRef = serde_yaml::from_str("model: gpt-4o-mini").unwrap();
        assert_eq!(target.provider, "openai");
        assert_eq!(target.model, "gpt-4o-mini");
    }

    #[test]
    fn test_model_ref_explicit_provider_from_yaml() {
        let target: ModelRef = serde_yaml::from_str("provider: ollama\nmodel: llama3.1").unwrap();
        assert_eq!(target.provider, "ollama");
        assert_eq!(target.model, "llama3.1");
    }

    #[test]
    fn test_adapter_error_http_display_contains_status() {
        let err = AdapterError::Http {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        assert!(err.to_string().contains("429"));
    }
}
