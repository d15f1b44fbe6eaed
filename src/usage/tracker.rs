//! Usage tracker: the single writer of the usage log

use crate::usage::cost::CostTable;
use crate::usage::report;
use crate::usage::store::UsageStore;
use crate::usage::types::{AttemptRecord, DailyUsage, TokenUsage, UsageReport};
use crate::utils::error::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Tracks token usage and cost for every recorded call outcome.
///
/// Owns the store exclusively: no other component writes usage rows. Rows are
/// persisted synchronously at the end of each outcome and never touched
/// again; reports re-scan the stored rows on every call.
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
    costs: CostTable,
}

impl UsageTracker {
    /// Create a tracker over a store and price table.
    pub fn new(store: Arc<dyn UsageStore>, costs: CostTable) -> Self {
        Self { store, costs }
    }

    /// Persist one call outcome; returns the row id.
    pub async fn log_usage(&self, record: AttemptRecord) -> Result<String> {
        let timestamp = Utc::now();
        let id = format!(
            "{}_{}_{}_{}",
            record.provider,
            record.model,
            record.function,
            timestamp.timestamp_millis()
        );

        let cost_usd = self
            .costs
            .calculate(&record.model, record.tokens_input, record.tokens_output);

        let row = TokenUsage {
            id: id.clone(),
            timestamp,
            provider: record.provider,
            model: record.model,
            function: record.function,
            tokens_input: record.tokens_input,
            tokens_output: record.tokens_output,
            tokens_total: record.tokens_input + record.tokens_output,
            cost_usd,
            response_time_ms: record.response_time_ms,
            status: record.status,
            error_message: record.error_message,
            fallback_model: record.fallback_model,
            retry_count: record.retry_count,
        };

        self.store.insert(&row).await?;
        debug!("recorded usage row {id} ({} USD)", row.cost_usd);
        Ok(id)
    }

    /// Per-(provider, function) aggregates for one day.
    pub async fn daily_usage(
        &self,
        date: NaiveDate,
        function: Option<&str>,
    ) -> Result<Vec<DailyUsage>> {
        let rows = self
            .store
            .fetch_range(day_start(date), day_end(date), function, None)
            .await?;
        Ok(report::daily_usage(&rows, date))
    }

    /// Report over an inclusive date range with optional filters.
    pub async fn usage_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        function: Option<&str>,
        provider: Option<&str>,
    ) -> Result<UsageReport> {
        let rows = self
            .store
            .fetch_range(day_start(start), day_end(end), function, provider)
            .await?;
        Ok(report::usage_report(&rows, start, end))
    }

    /// The price table in use.
    pub fn costs(&self) -> &CostTable {
        &self.costs
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exclusive upper bound: midnight of the following day.
fn day_end(date: NaiveDate) -> DateTime<Utc> {
    match date.checked_add_days(Days::new(1)) {
        Some(next) => day_start(next),
        None => DateTime::<Utc>::MAX_UTC,
    }
}
