//! Error classification for the fallback loop
//!
//! Providers return errors as free text; classification is substring matching
//! over the lower-cased message. Retryable patterns are scanned before
//! non-retryable ones, so a message matching both tables resolves to the
//! retryable kind. Unmatched messages default to `Unknown`, which is treated
//! as retryable: giving an unknown failure another chance is cheaper than
//! giving up on one that would have recovered.

use crate::core::providers::AdapterError;

/// Error taxonomy for provider call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Provider rate limiting (HTTP 429)
    RateLimit,
    /// Request or connection timeout
    Timeout,
    /// Provider temporarily unavailable (HTTP 503)
    ServiceUnavailable,
    /// Transport-level connection failure
    ConnectionError,
    /// Provider internal error (HTTP 500)
    InternalServerError,
    /// Rejected credentials (HTTP 401)
    InvalidApiKey,
    /// Unknown model (HTTP 404)
    ModelNotFound,
    /// Malformed request (HTTP 400)
    InvalidRequest,
    /// Account quota or billing failure
    QuotaExceeded,
    /// Content rejected by the provider's safety systems
    ContentFilter,
    /// Anything that matched no pattern
    Unknown,
}

impl ErrorKind {
    /// Stable tag used in logs and usage rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::ServiceUnavailable => "service_unavailable",
            Self::ConnectionError => "connection_error",
            Self::InternalServerError => "internal_server_error",
            Self::InvalidApiKey => "invalid_api_key",
            Self::ModelNotFound => "model_not_found",
            Self::InvalidRequest => "invalid_request",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContentFilter => "content_filter",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a failure of this kind is worth retrying on the same model.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit
                | Self::Timeout
                | Self::ServiceUnavailable
                | Self::ConnectionError
                | Self::InternalServerError
                | Self::Unknown
        )
    }
}

/// Ordered tables: first match wins within each table, retryable table first.
const RETRYABLE_PATTERNS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::RateLimit, &["rate limit", "429", "too many requests"]),
    (ErrorKind::Timeout, &["timeout", "timed out", "connection timeout"]),
    (
        ErrorKind::ServiceUnavailable,
        &["service unavailable", "503", "server error"],
    ),
    (
        ErrorKind::ConnectionError,
        &["connection", "network", "connection refused"],
    ),
    (
        ErrorKind::InternalServerError,
        &["internal server error", "500", "server error"],
    ),
];

const NON_RETRYABLE_PATTERNS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::InvalidApiKey,
        &["invalid api key", "401", "unauthorized", "authentication"],
    ),
    (
        ErrorKind::ModelNotFound,
        &["model not found", "404", "model does not exist"],
    ),
    (
        ErrorKind::InvalidRequest,
        &["invalid request", "400", "bad request", "malformed"],
    ),
    (
        ErrorKind::QuotaExceeded,
        &["quota exceeded", "billing", "payment required"],
    ),
    (
        ErrorKind::ContentFilter,
        &["content filter", "policy violation", "inappropriate"],
    ),
];

/// Classify an adapter error into a taxonomy kind.
pub fn classify(error: &AdapterError) -> ErrorKind {
    classify_message(&error.to_string())
}

/// Classify a raw error message.
pub fn classify_message(message: &str) -> ErrorKind {
    let message = message.to_lowercase();

    for (kind, patterns) in RETRYABLE_PATTERNS {
        if patterns.iter().any(|pattern| message.contains(pattern)) {
            return *kind;
        }
    }

    for (kind, patterns) in NON_RETRYABLE_PATTERNS {
        if patterns.iter().any(|pattern| message.contains(pattern)) {
            return *kind;
        }
    }

    ErrorKind::Unknown
}
