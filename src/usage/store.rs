//! Usage log storage boundary

use crate::usage::types::TokenUsage;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Append-only store for usage rows.
///
/// The tracker is the sole writer. Implementations never update or delete
/// rows; reads are range scans the report layer aggregates on demand.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Append one row.
    async fn insert(&self, row: &TokenUsage) -> Result<()>;

    /// Fetch rows with `start <= timestamp < end`, optionally filtered by
    /// function and provider, ordered by timestamp.
    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<TokenUsage>>;
}

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    rows: RwLock<Vec<TokenUsage>>,
}

impl MemoryUsageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, in insertion order.
    pub fn rows(&self) -> Vec<TokenUsage> {
        self.rows.read().clone()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn insert(&self, row: &TokenUsage) -> Result<()> {
        self.rows.write().push(row.clone());
        Ok(())
    }

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<TokenUsage>> {
        let rows = self.rows.read();
        let mut matched: Vec<TokenUsage> = rows
            .iter()
            .filter(|row| row.timestamp >= start && row.timestamp < end)
            .filter(|row| function.is_none_or(|f| row.function == f))
            .filter(|row| provider.is_none_or(|p| row.provider == p))
            .cloned()
            .collect();
        matched.sort_by_key(|row| row.timestamp);
        Ok(matched)
    }
}
