//! Run-to-run comparison of discovery scans.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{error_key, round1, TrendDirection, TrendScan};
use crate::models::{CompareResult, ErrorDelta, ErrorDeltaStatus, LogEntry, ScanStatus};

/// Error-message counts keyed on the first 100 characters, in message order.
pub type ErrorCounter = BTreeMap<String, usize>;

/// Counts Error-level log lines by message. Blank messages count as `Unknown`.
pub fn error_counter(entries: &[LogEntry]) -> ErrorCounter {
    let mut counter = ErrorCounter::new();
    for entry in entries.iter().filter(|e| e.has_level("Error")) {
        let key = if entry.message.is_empty() {
            "Unknown".to_string()
        } else {
            error_key(&entry.message)
        };
        *counter.entry(key).or_insert(0) += 1;
    }
    counter
}

fn duration_or_zero(scan: &ScanStatus) -> f64 {
    scan.duration_seconds().unwrap_or(0.0)
}

/// Compares baseline `a` with `b`. Every delta is `b - a`.
pub fn compare_runs(
    a: &ScanStatus,
    b: &ScanStatus,
    errors_a: &ErrorCounter,
    errors_b: &ErrorCounter,
    now: DateTime<Utc>,
) -> CompareResult {
    let mut errors_new = Vec::new();
    let mut errors_resolved = Vec::new();
    let mut errors_persistent = Vec::new();

    let messages: BTreeSet<&String> = errors_a.keys().chain(errors_b.keys()).collect();
    for message in messages {
        let count_a = errors_a.get(message).copied().unwrap_or(0);
        let count_b = errors_b.get(message).copied().unwrap_or(0);
        let (status, bucket) = match (count_a, count_b) {
            (0, _) => (ErrorDeltaStatus::New, &mut errors_new),
            (_, 0) => (ErrorDeltaStatus::Resolved, &mut errors_resolved),
            _ => (ErrorDeltaStatus::Persistent, &mut errors_persistent),
        };
        bucket.push(ErrorDelta {
            message: message.clone(),
            status,
            count_a,
            count_b,
        });
    }

    let total_a: usize = errors_a.values().sum();
    let total_b: usize = errors_b.values().sum();

    CompareResult {
        scan_a_sys_id: a.sys_id.clone(),
        scan_b_sys_id: b.sys_id.clone(),
        scan_a_state: a.state.clone(),
        scan_b_state: b.state.clone(),
        delta_ci_count: b.ci_count - a.ci_count,
        delta_error_count: total_b as i64 - total_a as i64,
        delta_duration_seconds: round1(duration_or_zero(b) - duration_or_zero(a)),
        cis_added: Vec::new(),
        cis_removed: Vec::new(),
        cis_changed: Vec::new(),
        errors_new,
        errors_resolved,
        errors_persistent,
        compared_at: Some(now),
    }
}

/// A consecutive pair of scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequentialComparison {
    pub scan_newer: TrendScan,
    pub scan_older: TrendScan,
    pub delta_ci_count: i64,
    pub delta_duration_seconds: f64,
}

/// Consecutive comparisons over a schedule's scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequentialReport {
    pub trend: TrendDirection,
    pub comparisons: Vec<SequentialComparison>,
}

/// Pairs each scan with the next older one. `scans` must be newest first.
///
/// The overall trend compares the newest CI count with the oldest. Fewer than
/// two scans yields no comparisons and a stable trend.
pub fn sequential_comparisons(scans: &[ScanStatus]) -> SequentialReport {
    let comparisons = scans
        .windows(2)
        .map(|pair| {
            let (newer, older) = (&pair[0], &pair[1]);
            SequentialComparison {
                scan_newer: TrendScan::from(newer),
                scan_older: TrendScan::from(older),
                delta_ci_count: newer.ci_count - older.ci_count,
                delta_duration_seconds: round1(duration_or_zero(newer) - duration_or_zero(older)),
            }
        })
        .collect();

    let trend = match (scans.first(), scans.last()) {
        (Some(first), Some(last)) if first.ci_count > last.ci_count => TrendDirection::Improving,
        (Some(first), Some(last)) if first.ci_count < last.ci_count => TrendDirection::Degrading,
        _ => TrendDirection::Stable,
    };

    SequentialReport { trend, comparisons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_snow_datetime;
    use pretty_assertions::assert_eq;

    fn error_log(message: &str) -> LogEntry {
        LogEntry {
            level: "Error".to_string(),
            message: message.to_string(),
            ..LogEntry::default()
        }
    }

    fn scan(sys_id: &str, ci_count: i64) -> ScanStatus {
        ScanStatus {
            sys_id: sys_id.to_string(),
            state: "Completed".to_string(),
            ci_count,
            ..ScanStatus::default()
        }
    }

    #[test]
    fn test_error_counter_skips_other_levels_and_truncates() {
        let long = "z".repeat(150);
        let entries = vec![
            error_log(&long),
            error_log(&format!("{}different tail", "z".repeat(100))),
            error_log(""),
            LogEntry {
                level: "Warning".to_string(),
                message: "ignored".to_string(),
                ..LogEntry::default()
            },
        ];
        let counter = error_counter(&entries);
        assert_eq!(counter.len(), 2);
        assert_eq!(counter.get(&"z".repeat(100)), Some(&2));
        assert_eq!(counter.get("Unknown"), Some(&1));
    }

    #[test]
    fn test_error_counter_from_wire_messages() {
        use crate::models::FromWire;
        let rows: Vec<crate::models::WireRecord> = [
            serde_json::json!({"level": "Error"}),
            serde_json::json!({"level": "Error", "message": "  "}),
            serde_json::json!({"level": "Error", "message": " Timeout "}),
            serde_json::json!({"level": "Error", "message": "Timeout"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let counter = error_counter(&LogEntry::from_wire_all(&rows));
        assert_eq!(counter.get("Unknown"), Some(&2));
        assert_eq!(counter.get("Timeout"), Some(&2));
    }

    #[test]
    fn test_compare_new_and_resolved_errors() {
        let a = scan("a", 40);
        let b = scan("b", 45);
        let errors_a = error_counter(&[error_log("X")]);
        let errors_b = error_counter(&[error_log("Y")]);

        let result = compare_runs(&a, &b, &errors_a, &errors_b, Utc::now());
        assert_eq!(result.delta_ci_count, 5);
        assert_eq!(result.delta_error_count, 0);
        assert_eq!(
            result.errors_resolved,
            vec![ErrorDelta {
                message: "X".to_string(),
                status: ErrorDeltaStatus::Resolved,
                count_a: 1,
                count_b: 0,
            }]
        );
        assert_eq!(
            result.errors_new,
            vec![ErrorDelta {
                message: "Y".to_string(),
                status: ErrorDeltaStatus::New,
                count_a: 0,
                count_b: 1,
            }]
        );
        assert!(result.errors_persistent.is_empty());
    }

    #[test]
    fn test_compare_persistent_counts_and_duration() {
        let mut a = scan("a", 10);
        a.started = parse_snow_datetime("2024-01-15 10:00:00");
        a.completed = parse_snow_datetime("2024-01-15 10:01:00");
        let mut b = scan("b", 8);
        b.started = parse_snow_datetime("2024-01-16 10:00:00");
        b.completed = parse_snow_datetime("2024-01-16 10:00:30");

        let errors_a = error_counter(&[error_log("Timeout"), error_log("Timeout")]);
        let errors_b = error_counter(&[error_log("Timeout"), error_log("Denied"), error_log("Timeout"), error_log("Timeout")]);

        let result = compare_runs(&a, &b, &errors_a, &errors_b, Utc::now());
        assert_eq!(result.delta_ci_count, -2);
        assert_eq!(result.delta_error_count, 2);
        assert_eq!(result.delta_duration_seconds, -30.0);
        assert_eq!(result.errors_persistent.len(), 1);
        assert_eq!(result.errors_persistent[0].count_a, 2);
        assert_eq!(result.errors_persistent[0].count_b, 3);
        assert_eq!(result.errors_new[0].message, "Denied");
    }

    #[test]
    fn test_missing_durations_count_as_zero() {
        let mut b = scan("b", 0);
        b.started = parse_snow_datetime("2024-01-16 10:00:00");
        b.completed = parse_snow_datetime("2024-01-16 10:00:12");
        let result = compare_runs(&scan("a", 0), &b, &ErrorCounter::new(), &ErrorCounter::new(), Utc::now());
        assert_eq!(result.delta_duration_seconds, 12.0);
    }

    #[test]
    fn test_sequential_pairs_and_trend() {
        let scans = vec![scan("n", 50), scan("m", 45), scan("o", 40)];
        let report = sequential_comparisons(&scans);
        assert_eq!(report.trend, TrendDirection::Improving);
        assert_eq!(report.comparisons.len(), 2);
        assert_eq!(report.comparisons[0].scan_newer.sys_id, "n");
        assert_eq!(report.comparisons[0].scan_older.sys_id, "m");
        assert_eq!(report.comparisons[0].delta_ci_count, 5);
        assert_eq!(report.comparisons[1].delta_ci_count, 5);
    }

    #[test]
    fn test_sequential_degrading_and_too_few() {
        assert_eq!(
            sequential_comparisons(&[scan("n", 1), scan("o", 9)]).trend,
            TrendDirection::Degrading
        );
        let single = sequential_comparisons(&[scan("n", 1)]);
        assert!(single.comparisons.is_empty());
        assert_eq!(single.trend, TrendDirection::Stable);
    }
}
