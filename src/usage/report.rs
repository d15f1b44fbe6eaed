//! On-demand aggregation over the usage log
//!
//! Reports are always recomputed from the append-only rows; nothing here is
//! cached or materialized.

use crate::usage::types::{DailyUsage, TokenUsage, UsageBreakdown, UsageReport, UsageStatus};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Aggregate one day of rows into per-(provider, function) summaries.
pub fn daily_usage(rows: &[TokenUsage], date: NaiveDate) -> Vec<DailyUsage> {
    let mut groups: BTreeMap<(String, String), Vec<&TokenUsage>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.provider.clone(), row.function.clone()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((provider, function), rows)| {
            let call_count = rows.len() as u64;
            let total_tokens: u64 = rows.iter().map(|r| r.tokens_total).sum();
            DailyUsage {
                date,
                provider,
                function,
                total_tokens,
                total_cost_usd: rows.iter().map(|r| r.cost_usd).sum(),
                call_count,
                success_count: count_status(&rows, UsageStatus::Success),
                failure_count: count_status(&rows, UsageStatus::Failed),
                fallback_count: count_fallbacks(&rows),
                avg_response_time_ms: mean(rows.iter().map(|r| r.response_time_ms as f64)),
                avg_tokens_per_call: mean(rows.iter().map(|r| r.tokens_total as f64)),
            }
        })
        .collect()
}

/// Build a report over a date range from its rows.
pub fn usage_report(rows: &[TokenUsage], start: NaiveDate, end: NaiveDate) -> UsageReport {
    let total_calls = rows.len() as u64;
    let success_count = count_status_owned(rows, UsageStatus::Success);
    let fallback_count = rows.iter().filter(|r| r.fallback_model.is_some()).count() as u64;

    let mut usage_by_function: BTreeMap<String, UsageBreakdown> = BTreeMap::new();
    let mut usage_by_provider: BTreeMap<String, UsageBreakdown> = BTreeMap::new();
    for row in rows {
        accumulate(usage_by_function.entry(row.function.clone()).or_default(), row);
        accumulate(usage_by_provider.entry(row.provider.clone()).or_default(), row);
    }
    for breakdown in usage_by_function.values_mut().chain(usage_by_provider.values_mut()) {
        finalize_rates(breakdown);
    }

    UsageReport {
        period: format!("{start} to {end}"),
        start_date: start,
        end_date: end,
        total_cost_usd: rows.iter().map(|r| r.cost_usd).sum(),
        total_tokens: rows.iter().map(|r| r.tokens_total).sum(),
        total_calls,
        success_rate: percentage(success_count, total_calls),
        fallback_rate: percentage(fallback_count, total_calls),
        avg_response_time_ms: mean(rows.iter().map(|r| r.response_time_ms as f64)),
        usage_by_function: usage_by_function.into_iter().collect(),
        usage_by_provider: usage_by_provider.into_iter().collect(),
    }
}

fn accumulate(breakdown: &mut UsageBreakdown, row: &TokenUsage) {
    breakdown.total_tokens += row.tokens_total;
    breakdown.total_cost_usd += row.cost_usd;
    breakdown.call_count += 1;
    if row.status == UsageStatus::Success {
        breakdown.success_count += 1;
    }
    if row.fallback_model.is_some() {
        breakdown.fallback_count += 1;
    }
}

fn finalize_rates(breakdown: &mut UsageBreakdown) {
    breakdown.success_rate = percentage(breakdown.success_count, breakdown.call_count);
    breakdown.fallback_rate = percentage(breakdown.fallback_count, breakdown.call_count);
}

fn count_status(rows: &[&TokenUsage], status: UsageStatus) -> u64 {
    rows.iter().filter(|r| r.status == status).count() as u64
}

fn count_status_owned(rows: &[TokenUsage], status: UsageStatus) -> u64 {
    rows.iter().filter(|r| r.status == status).count() as u64
}

fn count_fallbacks(rows: &[&TokenUsage]) -> u64 {
    rows.iter().filter(|r| r.fallback_model.is_some()).count() as u64
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
