//! Trend classification over a newest-first list of scans.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::round1;
use crate::models::ScanStatus;

/// Direction of CI discovery over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
    InsufficientData,
    NoData,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Degrading => "degrading",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
            TrendDirection::NoData => "no_data",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

/// Classifies CI counts ordered newest first.
///
/// The list is split by index: the newer half is `counts[..n/2]`, the older
/// half `counts[n/2..]`. A newer mean more than 10% above the older mean is
/// improving, more than 10% below is degrading.
pub fn trend_direction(ci_counts: &[i64]) -> TrendDirection {
    if ci_counts.len() < 2 {
        return TrendDirection::InsufficientData;
    }
    let (newer, older) = ci_counts.split_at(ci_counts.len() / 2);
    let (avg_newer, avg_older) = (mean(newer), mean(older));

    if avg_newer > avg_older * 1.1 {
        TrendDirection::Improving
    } else if avg_newer < avg_older * 0.9 {
        TrendDirection::Degrading
    } else {
        TrendDirection::Stable
    }
}

/// One scan as listed in a trend report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendScan {
    pub sys_id: String,
    pub name: String,
    pub state: String,
    pub ci_count: i64,
    pub started: Option<DateTime<Utc>>,
}

impl From<&ScanStatus> for TrendScan {
    fn from(scan: &ScanStatus) -> Self {
        TrendScan {
            sys_id: scan.sys_id.clone(),
            name: scan.name.clone(),
            state: scan.state.clone(),
            ci_count: scan.ci_count,
            started: scan.started,
        }
    }
}

/// Aggregate metrics for a run of scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub scan_count: usize,
    pub total_cis_discovered: i64,
    pub completed: usize,
    pub errors: usize,
    pub success_rate_percent: f64,
    pub avg_duration_seconds: f64,
    pub trend_direction: TrendDirection,
    pub scans: Vec<TrendScan>,
}

impl TrendSummary {
    /// Summarizes scans ordered newest first.
    pub fn from_scans(scans: &[ScanStatus]) -> Self {
        let completed = scans.iter().filter(|s| s.state == "Completed").count();
        let errors = scans.iter().filter(|s| s.state == "Error").count();
        let success_rate = if scans.is_empty() {
            0.0
        } else {
            completed as f64 / scans.len() as f64 * 100.0
        };

        let durations: Vec<f64> = scans.iter().filter_map(ScanStatus::duration_seconds).collect();
        let avg_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let ci_counts: Vec<i64> = scans.iter().map(|s| s.ci_count).collect();
        let trend_direction = if scans.is_empty() {
            TrendDirection::NoData
        } else {
            trend_direction(&ci_counts)
        };

        TrendSummary {
            scan_count: scans.len(),
            total_cis_discovered: ci_counts.iter().sum(),
            completed,
            errors,
            success_rate_percent: round1(success_rate),
            avg_duration_seconds: round1(avg_duration),
            trend_direction,
            scans: scans.iter().map(TrendScan::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_snow_datetime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_newer_drop_is_degrading() {
        assert_eq!(trend_direction(&[10, 10, 30, 30]), TrendDirection::Degrading);
    }

    #[test]
    fn test_newer_rise_is_improving() {
        assert_eq!(trend_direction(&[30, 30, 10, 10]), TrendDirection::Improving);
    }

    #[test]
    fn test_within_ten_percent_is_stable() {
        assert_eq!(trend_direction(&[105, 100]), TrendDirection::Stable);
        assert_eq!(trend_direction(&[0, 0]), TrendDirection::Stable);
    }

    #[test]
    fn test_odd_length_puts_middle_in_older_half() {
        // newer = [20], older = [10, 10]
        assert_eq!(trend_direction(&[20, 10, 10]), TrendDirection::Improving);
    }

    #[test]
    fn test_fewer_than_two_is_insufficient() {
        assert_eq!(trend_direction(&[]), TrendDirection::InsufficientData);
        assert_eq!(trend_direction(&[42]), TrendDirection::InsufficientData);
    }

    #[test]
    fn test_summary_metrics() {
        let scans = vec![
            ScanStatus {
                state: "Completed".to_string(),
                ci_count: 10,
                started: parse_snow_datetime("2024-01-15 10:00:00"),
                completed: parse_snow_datetime("2024-01-15 10:00:45"),
                ..ScanStatus::default()
            },
            ScanStatus {
                state: "Error".to_string(),
                ci_count: 0,
                ..ScanStatus::default()
            },
            ScanStatus {
                state: "Completed".to_string(),
                ci_count: 20,
                ..ScanStatus::default()
            },
        ];
        let summary = TrendSummary::from_scans(&scans);
        assert_eq!(summary.scan_count, 3);
        assert_eq!(summary.total_cis_discovered, 30);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.success_rate_percent, 66.7);
        assert_eq!(summary.avg_duration_seconds, 45.0);
        assert_eq!(summary.trend_direction, TrendDirection::Degrading);
        assert_eq!(summary.scans.len(), 3);
    }

    #[test]
    fn test_summary_of_nothing_is_no_data() {
        let summary = TrendSummary::from_scans(&[]);
        assert_eq!(summary.trend_direction, TrendDirection::NoData);
        assert_eq!(summary.success_rate_percent, 0.0);
    }
}
