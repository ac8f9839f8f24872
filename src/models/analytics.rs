//! Derived analytics results. None of these map to a table.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An error message and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: usize,
    pub level: String,
}

impl ErrorCount {
    /// An `Error`-level counter.
    pub fn error(message: impl Into<String>, count: usize) -> Self {
        ErrorCount {
            message: message.into(),
            count,
            level: "Error".to_string(),
        }
    }
}

/// Aggregated health metrics for one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total_scans: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Percentage of failed scans, within `0.0..=100.0`.
    pub error_rate: f64,
    pub avg_duration_seconds: f64,
    pub total_cis_discovered: i64,
    /// At most ten entries, most frequent first.
    pub top_errors: Vec<ErrorCount>,
    /// Within `0..=100`.
    pub health_score: u8,
    pub period: String,
    pub computed_at: Option<DateTime<Utc>>,
}

/// How a CI differs between two runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CIDelta {
    pub sys_id: String,
    pub name: String,
    pub ci_type: String,
    /// `added`, `removed` or `changed`.
    pub change_type: String,
    pub details: String,
}

/// Whether an error appeared, disappeared or stayed between two runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDeltaStatus {
    New,
    Resolved,
    Persistent,
}

/// One error message compared across two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDelta {
    pub message: String,
    pub status: ErrorDeltaStatus,
    pub count_a: usize,
    pub count_b: usize,
}

/// Differences between scan A (baseline) and scan B.
///
/// Every delta is `B - A`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareResult {
    pub scan_a_sys_id: String,
    pub scan_b_sys_id: String,
    pub scan_a_state: String,
    pub scan_b_state: String,
    pub delta_ci_count: i64,
    pub delta_error_count: i64,
    pub delta_duration_seconds: f64,
    pub cis_added: Vec<CIDelta>,
    pub cis_removed: Vec<CIDelta>,
    pub cis_changed: Vec<CIDelta>,
    pub errors_new: Vec<ErrorDelta>,
    pub errors_resolved: Vec<ErrorDelta>,
    pub errors_persistent: Vec<ErrorDelta>,
    pub compared_at: Option<DateTime<Utc>>,
}
