//! Per-model circuit breakers
//!
//! Each model gets a lazily created breaker entry. Entries live in a
//! [`DashMap`]; every check-and-update runs while holding the entry's shard
//! lock, so concurrent callers cannot double-trip a breaker or race the
//! open-to-half-open timeout check. Half-open admits exactly one in-flight
//! trial call; other callers are rejected until that trial resolves.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected until the recovery timeout elapses
    Open,
    /// A single trial call is probing recovery
    HalfOpen,
}

impl CircuitState {
    /// Stable tag for logs and status endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            trial_in_flight: false,
        }
    }
}

/// Registry of per-model circuit breakers.
pub struct CircuitBreakerRegistry {
    failure_threshold: u32,
    recovery_timeout: Duration,
    breakers: DashMap<String, BreakerEntry>,
}

impl CircuitBreakerRegistry {
    /// Create a registry with the given thresholds.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            breakers: DashMap::new(),
        }
    }

    /// Whether calls to this model are currently rejected.
    ///
    /// An open breaker whose recovery timeout has elapsed transitions to
    /// half-open here and admits the caller that observed the transition as
    /// the trial call. While that trial is in flight, further checks return
    /// `true`.
    pub fn is_open(&self, model: &str) -> bool {
        let Some(mut entry) = self.breakers.get_mut(model) else {
            return false;
        };

        match entry.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let recovered = entry
                    .last_failure
                    .is_some_and(|at| at.elapsed() > self.recovery_timeout);
                if recovered {
                    debug!("circuit for {model} transitioning open -> half_open");
                    entry.state = CircuitState::HalfOpen;
                    entry.trial_in_flight = true;
                    false
                } else {
                    true
                }
            }
            CircuitState::HalfOpen => {
                if entry.trial_in_flight {
                    true
                } else {
                    entry.trial_in_flight = true;
                    false
                }
            }
        }
    }

    /// Record a model-level failure (retries exhausted or trial failed).
    pub fn record_failure(&self, model: &str) {
        let mut entry = self.breakers.entry(model.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_failure = Some(Instant::now());

        if entry.state == CircuitState::HalfOpen {
            warn!("circuit for {model} reopening after failed trial call");
            entry.state = CircuitState::Open;
            entry.trial_in_flight = false;
        } else if entry.state == CircuitState::Closed
            && entry.failure_count >= self.failure_threshold
        {
            warn!(
                "circuit for {model} opening after {} consecutive failures",
                entry.failure_count
            );
            entry.state = CircuitState::Open;
        }
    }

    /// Record a success, closing the breaker and clearing its counters.
    pub fn record_success(&self, model: &str) {
        if let Some(mut entry) = self.breakers.get_mut(model) {
            if entry.state != CircuitState::Closed {
                debug!("circuit for {model} closing after success");
            }
            entry.state = CircuitState::Closed;
            entry.failure_count = 0;
            entry.trial_in_flight = false;
        }
    }

    /// Release a half-open trial slot without resolving it either way.
    ///
    /// Used when the trial call was abandoned on a non-retryable error: the
    /// error says nothing about the model's availability, so the breaker
    /// neither closes nor counts a failure, and the next caller may trial.
    pub fn release_trial(&self, model: &str) {
        if let Some(mut entry) = self.breakers.get_mut(model) {
            if entry.state == CircuitState::HalfOpen {
                entry.trial_in_flight = false;
            }
        }
    }

    /// Current state for a model; models with no recorded failures are closed.
    pub fn state(&self, model: &str) -> CircuitState {
        self.breakers
            .get(model)
            .map(|entry| entry.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Consecutive failure count for a model.
    pub fn failure_count(&self, model: &str) -> u32 {
        self.breakers
            .get(model)
            .map(|entry| entry.failure_count)
            .unwrap_or(0)
    }
}
