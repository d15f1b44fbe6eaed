//! Error types for the fallback engine

use crate::core::providers::AdapterError;
use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the engine
///
/// Provider-side call failures are handled inside the fallback loop and never
/// surface through this type; callers only see `EngineError` for
/// configuration, validation, and persistence problems.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider adapter errors
    #[error("Provider error: {0}")]
    Adapter(#[from] AdapterError),
}
