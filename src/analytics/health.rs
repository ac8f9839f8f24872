//! Discovery health scoring.
//!
//! The overall score weights scan health at 40% and schedule, credential and
//! range health at 20% each. Scan health loses two points per percent of
//! failed scans; the other three are the share of active records, or 50 when
//! nothing is configured.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{error_key, most_common, round1};
use crate::error::SnowError;
use crate::models::{ErrorCount, HealthSummary, ScanStatus, SNOW_DATETIME_FORMAT};

/// Score given to a component with no records.
pub const EMPTY_COMPONENT_SCORE: u8 = 50;

/// Maximum entries in `top_errors`.
pub const TOP_ERRORS_LIMIT: usize = 10;

/// Error rate (percent) above which a recommendation is made.
const HIGH_ERROR_RATE: f64 = 20.0;

/// Analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    #[default]
    Week,
    Month,
}

impl Period {
    pub const NAMES: [&'static str; 3] = ["day", "month", "week"];

    pub fn days(&self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Start of the window ending at `now`, in ServiceNow datetime format.
    pub fn since(&self, now: DateTime<Utc>) -> String {
        (now - Duration::days(self.days()))
            .format(SNOW_DATETIME_FORMAT)
            .to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = SnowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            _ => Err(SnowError::validation(format!(
                "Invalid period: '{}'. Valid periods: ['{}']",
                normalized,
                Self::NAMES.join("', '")
            ))),
        }
    }
}

/// Health band for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLabel {
    Healthy,
    Warning,
    Critical,
}

impl HealthLabel {
    pub fn for_score(score: u8) -> Self {
        if score >= 80 {
            HealthLabel::Healthy
        } else if score >= 50 {
            HealthLabel::Warning
        } else {
            HealthLabel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Healthy => "healthy",
            HealthLabel::Warning => "warning",
            HealthLabel::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for a raw `active` column holding `"true"` or `true`.
///
/// Deliberately stricter than model coercion: `"1"` or `"yes"` do not count.
pub fn is_active_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Active-ratio health of one configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub score: u8,
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl ComponentHealth {
    pub fn from_counts(total: usize, active: usize) -> Self {
        let active = active.min(total);
        let score = if total == 0 {
            EMPTY_COMPONENT_SCORE
        } else {
            (100.0 * active as f64 / total as f64).round() as u8
        };
        ComponentHealth {
            score,
            total,
            active,
            inactive: total - active,
        }
    }

    /// Counts rows whose raw `active` column is set.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a serde_json::Map<String, Value>>,
    {
        let (total, active) = rows.into_iter().fold((0, 0), |(total, active), row| {
            (total + 1, active + usize::from(is_active_flag(row.get("active"))))
        });
        Self::from_counts(total, active)
    }
}

/// Scan-level metrics for the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanHealth {
    pub score: u8,
    pub total_scans: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub error_rate_percent: f64,
    pub avg_duration_seconds: f64,
    #[serde(skip)]
    pub total_cis: i64,
    #[serde(skip)]
    error_rate_exact: f64,
}

impl ScanHealth {
    pub fn from_scans(scans: &[ScanStatus]) -> Self {
        let total_scans = scans.len();
        let count_state = |state: &str| scans.iter().filter(|s| s.state == state).count();
        let completed = count_state("Completed");
        let failed = count_state("Error");
        let cancelled = count_state("Cancelled");

        let error_rate = if total_scans == 0 {
            0.0
        } else {
            failed as f64 / total_scans as f64 * 100.0
        };

        let durations: Vec<f64> = scans.iter().filter_map(ScanStatus::duration_seconds).collect();
        let avg_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let score = (100.0 - 2.0 * error_rate).clamp(0.0, 100.0).round() as u8;

        ScanHealth {
            score,
            total_scans,
            completed,
            failed,
            cancelled,
            error_rate_percent: round1(error_rate),
            avg_duration_seconds: round1(avg_duration),
            total_cis: scans.iter().map(|s| s.ci_count).sum(),
            error_rate_exact: error_rate,
        }
    }
}

/// Per-component breakdown of the overall score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubMetrics {
    pub scan_health: ScanHealth,
    pub schedule_health: ComponentHealth,
    pub credential_health: ComponentHealth,
    pub range_health: ComponentHealth,
}

impl SubMetrics {
    /// Weighted overall score, clamped to `0..=100`.
    pub fn overall_score(&self) -> u8 {
        let weighted = f64::from(self.scan_health.score) * 0.4
            + f64::from(self.schedule_health.score) * 0.2
            + f64::from(self.credential_health.score) * 0.2
            + f64::from(self.range_health.score) * 0.2;
        weighted.round().clamp(0.0, 100.0) as u8
    }
}

/// Full health result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub summary: HealthSummary,
    pub sub_metrics: SubMetrics,
    pub status: HealthLabel,
    pub recommendations: Vec<String>,
}

/// Groups Error-level messages by their first 100 characters and keeps the
/// ten most frequent.
pub fn top_errors<'a, I>(messages: I) -> Vec<ErrorCount>
where
    I: IntoIterator<Item = &'a str>,
{
    most_common(messages.into_iter().map(error_key))
        .into_iter()
        .take(TOP_ERRORS_LIMIT)
        .map(|(message, count)| ErrorCount::error(message, count))
        .collect()
}

/// Builds the report from per-component metrics.
///
/// `top_errors` is only meaningful when some scans failed; callers skip the
/// log query otherwise and pass an empty list.
pub fn compute_health(
    period: Period,
    sub_metrics: SubMetrics,
    top_errors: Vec<ErrorCount>,
    include_recommendations: bool,
    now: DateTime<Utc>,
) -> HealthReport {
    let health_score = sub_metrics.overall_score();
    let status = HealthLabel::for_score(health_score);
    let scan = &sub_metrics.scan_health;

    let summary = HealthSummary {
        total_scans: scan.total_scans,
        successful: scan.completed,
        failed: scan.failed,
        cancelled: scan.cancelled,
        error_rate: scan.error_rate_percent.clamp(0.0, 100.0),
        avg_duration_seconds: scan.avg_duration_seconds,
        total_cis_discovered: scan.total_cis,
        top_errors,
        health_score,
        period: period.as_str().to_string(),
        computed_at: Some(now),
    };

    let recommendations = if include_recommendations {
        recommendations(period, &sub_metrics, health_score)
    } else {
        Vec::new()
    };

    HealthReport {
        summary,
        sub_metrics,
        status,
        recommendations,
    }
}

/// Independent threshold rules; several may fire at once.
fn recommendations(period: Period, metrics: &SubMetrics, health_score: u8) -> Vec<String> {
    let scan = &metrics.scan_health;
    let schedules = &metrics.schedule_health;
    let mut out = Vec::new();

    if scan.error_rate_exact > HIGH_ERROR_RATE {
        out.push(format!(
            "High error rate ({:.0}%). Review failed scans and use the \
             'remediate_discovery_failures' tool to diagnose issues.",
            scan.error_rate_exact
        ));
    }
    if schedules.inactive > schedules.active && schedules.total > 0 {
        out.push(format!(
            "{} inactive schedule(s) detected. Review and activate needed schedules.",
            schedules.inactive
        ));
    }
    if metrics.credential_health.inactive > 0 {
        out.push(format!(
            "{} inactive credential(s). Verify they are no longer needed or re-activate.",
            metrics.credential_health.inactive
        ));
    }
    if metrics.range_health.total == 0 {
        out.push("No discovery ranges configured. Add IP ranges to enable discovery.".to_string());
    }
    if scan.total_scans == 0 {
        out.push(format!(
            "No scans in the last {}. Check schedule configuration.",
            period
        ));
    }
    if health_score >= 80 {
        out.push("Discovery health is good. Continue monitoring.".to_string());
    }

    out
}
