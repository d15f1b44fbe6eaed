//! Fallback execution: chains, retries, breakers, and error classification

pub mod circuit_breaker;
pub mod classifier;
pub mod manager;
pub mod retry;
pub mod types;

pub use circuit_breaker::{CircuitBreakerRegistry, CircuitState};
pub use classifier::{classify, classify_message, ErrorKind};
pub use manager::FallbackManager;
pub use retry::RetryPolicy;
pub use types::FallbackResult;
