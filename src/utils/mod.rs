//! Shared utilities for the fallback engine

/// Error types and result alias
pub mod error;
/// Token estimation helpers
pub mod tokens;
