mod backend;
mod types;

pub use backend::{HttpStatsBackend, StatsBackend};
pub use types::{DashboardStats, TimeDataResponse, TimeDataUpload, TimeRecord};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike};

/// Episodes longer than this many seconds count as "good".
pub const DEFAULT_GOOD_THRESHOLD_SECS: u64 = 300;

pub fn compute_stats(records: &[TimeRecord], good_threshold_secs: u64) -> DashboardStats {
    if records.is_empty() {
        return DashboardStats::default();
    }

    let mut max_seconds = u64::MIN;
    let mut min_seconds = u64::MAX;
    let mut total: u128 = 0;
    let mut good_count = 0;

    for record in records {
        max_seconds = max_seconds.max(record.seconds);
        min_seconds = min_seconds.min(record.seconds);
        total += u128::from(record.seconds);
        if record.seconds > good_threshold_secs {
            good_count += 1;
        }
    }

    DashboardStats {
        max_seconds,
        min_seconds,
        avg_seconds: total as f64 / records.len() as f64,
        good_count,
        total_count: records.len(),
    }
}

/// `d/m/yyyy` in the timestamp's own offset, without zero padding.
pub fn format_record_date(iso: &str) -> Result<String> {
    let date = DateTime::parse_from_rfc3339(iso)
        .map_err(|err| anyhow!("invalid record date '{iso}': {err}"))?;
    Ok(format!("{}/{}/{}", date.day(), date.month(), date.year()))
}

/// What the dashboard shows: a loading placeholder until the first fetch
/// settles, then the records and their statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Loading,
    Loaded {
        records: Vec<TimeRecord>,
        stats: DashboardStats,
    },
}

impl DashboardView {
    pub fn from_records(records: Vec<TimeRecord>, good_threshold_secs: u64) -> Self {
        let stats = compute_stats(&records, good_threshold_secs);
        DashboardView::Loaded { records, stats }
    }

    /// Renders the view as plain text, one line per row.
    pub fn lines(&self) -> Vec<String> {
        let DashboardView::Loaded { records, stats } = self else {
            return vec!["Loading...".to_string()];
        };

        let mut lines = vec![
            format!("Good Data: {}", stats.good_count),
            format!("Not Good Data: {}", stats.not_good_count()),
            format!("Max: {}", stats.max_seconds),
            format!("Min: {}", stats.min_seconds),
            format!("Average: {}", stats.average_display()),
            "All Recorded".to_string(),
        ];
        for record in records {
            let date = format_record_date(&record.date).unwrap_or_else(|_| record.date.clone());
            lines.push(format!(
                "{}  Date: {}  Time: {} seconds",
                record.id, date, record.seconds
            ));
        }
        lines
    }
}
