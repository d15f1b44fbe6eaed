//! Token usage tracking, cost accounting, and reporting

mod cost;
mod report;
mod sqlite;
mod store;
mod tracker;
mod types;

pub use cost::CostTable;
pub use report::{daily_usage, usage_report};
pub use sqlite::SqliteUsageStore;
pub use store::{MemoryUsageStore, UsageStore};
pub use tracker::UsageTracker;
pub use types::{
    AttemptRecord, DailyUsage, TokenUsage, UsageBreakdown, UsageReport, UsageStatus,
};
