//! Usage record and report types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::error::{EngineError, Result};

/// Status of one recorded call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    /// The call produced a response
    Success,
    /// The call (or the whole chain) failed terminally
    Failed,
    /// A fallback model produced the response
    FallbackUsed,
}

impl UsageStatus {
    /// Stable tag persisted in the usage log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::FallbackUsed => "fallback_used",
        }
    }

    /// Parse a persisted tag back into a status.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "fallback_used" => Ok(Self::FallbackUsed),
            other => Err(EngineError::Validation(format!(
                "unknown usage status '{other}'"
            ))),
        }
    }
}

/// One append-only usage row, created per recorded call outcome.
///
/// Rows are never mutated after insert; reports are always recomputed from
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Synthetic identifier: `{provider}_{model}_{function}_{epoch_millis}`
    pub id: String,
    /// Insertion time
    pub timestamp: DateTime<Utc>,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Logical API function that triggered the call
    pub function: String,
    /// Estimated input tokens
    pub tokens_input: u64,
    /// Estimated output tokens
    pub tokens_output: u64,
    /// Input plus output tokens
    pub tokens_total: u64,
    /// Estimated cost in USD
    pub cost_usd: f64,
    /// Wall-clock call time in milliseconds
    pub response_time_ms: u64,
    /// Outcome of the call
    pub status: UsageStatus,
    /// Error message for failed calls
    pub error_message: Option<String>,
    /// Set when the responding model was not the chain's primary
    pub fallback_model: Option<String>,
    /// Retries consumed before this outcome
    pub retry_count: u32,
}

/// Input to [`UsageTracker::log_usage`](crate::usage::UsageTracker::log_usage):
/// everything the tracker cannot derive itself.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Logical API function
    pub function: String,
    /// Estimated input tokens
    pub tokens_input: u64,
    /// Estimated output tokens
    pub tokens_output: u64,
    /// Wall-clock call time in milliseconds
    pub response_time_ms: u64,
    /// Outcome of the call
    pub status: UsageStatus,
    /// Error message for failed calls
    pub error_message: Option<String>,
    /// Set when the responding model was not the chain's primary
    pub fallback_model: Option<String>,
    /// Retries consumed before this outcome
    pub retry_count: u32,
}

/// Daily aggregate for one (provider, function) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Day covered by the aggregate
    pub date: NaiveDate,
    /// Provider name
    pub provider: String,
    /// Logical API function
    pub function: String,
    /// Sum of token totals
    pub total_tokens: u64,
    /// Sum of costs in USD
    pub total_cost_usd: f64,
    /// Number of rows
    pub call_count: u64,
    /// Rows with status `success`
    pub success_count: u64,
    /// Rows with status `failed`
    pub failure_count: u64,
    /// Rows where a fallback model responded
    pub fallback_count: u64,
    /// Mean response time in milliseconds
    pub avg_response_time_ms: f64,
    /// Mean token total per row
    pub avg_tokens_per_call: f64,
}

/// Aggregate for one function or provider inside a [`UsageReport`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageBreakdown {
    /// Sum of token totals
    pub total_tokens: u64,
    /// Sum of costs in USD
    pub total_cost_usd: f64,
    /// Number of rows
    pub call_count: u64,
    /// Rows with status `success`
    pub success_count: u64,
    /// Rows where a fallback model responded
    pub fallback_count: u64,
    /// Success percentage over `call_count`
    pub success_rate: f64,
    /// Fallback percentage over `call_count`
    pub fallback_rate: f64,
}

/// Usage report over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// Human-readable description of the covered period
    pub period: String,
    /// First day covered (inclusive)
    pub start_date: NaiveDate,
    /// Last day covered (inclusive)
    pub end_date: NaiveDate,
    /// Sum of costs in USD
    pub total_cost_usd: f64,
    /// Sum of token totals
    pub total_tokens: u64,
    /// Number of rows
    pub total_calls: u64,
    /// Success percentage over all rows
    pub success_rate: f64,
    /// Fallback percentage over all rows
    pub fallback_rate: f64,
    /// Mean response time in milliseconds over all rows
    pub avg_response_time_ms: f64,
    /// Per-function breakdowns
    pub usage_by_function: HashMap<String, UsageBreakdown>,
    /// Per-provider breakdowns
    pub usage_by_provider: HashMap<String, UsageBreakdown>,
}
