//! The `analyze_discovery_results` tool.

use serde::Serialize;
use serde_json::json;

use super::status::fetch_scan;
use super::validation::{truncate, validate_optional_sys_id, validate_sys_id};
use super::{effective_limit, to_data, AnalysisInput, ToolOutput, ToolResult};
use crate::analytics::{most_common, CoverageReport, ErrorCategory, TrendSummary};
use crate::error::SnowError;
use crate::models::{FromWire, LogEntry, Range, ScanStatus};
use crate::query::{join_conditions, TableQuery};
use crate::snow_client::SnowClient;

/// Log rows read per scan.
const LOG_LIMIT: u32 = 500;

/// Scans compared by a trend when the caller gives no count.
const DEFAULT_TREND_SCANS: u32 = 10;

/// Completed scans read for coverage.
const COVERAGE_SCAN_LIMIT: u32 = 50;

/// Active ranges read for coverage.
const COVERAGE_RANGE_LIMIT: u32 = 200;

const TOP_CATEGORIES: usize = 10;
const LISTED_ERRORS: usize = 50;
const ERROR_MESSAGE_LEN: usize = 200;

/// A validated `analyze_discovery_results` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRequest {
    Analyze { scan_sys_id: String },
    Errors { scan_sys_id: String },
    Trend {
        schedule_sys_id: Option<String>,
        last_n_scans: u32,
        date_from: Option<String>,
        date_to: Option<String>,
    },
    Coverage { schedule_sys_id: String },
}

impl AnalysisInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<AnalysisRequest, SnowError> {
        use super::AnalysisAction::*;
        let scan_id = || validate_sys_id(self.scan_sys_id.as_deref(), "scan_sys_id");
        Ok(match self.action {
            Analyze => AnalysisRequest::Analyze { scan_sys_id: scan_id()? },
            Errors => AnalysisRequest::Errors { scan_sys_id: scan_id()? },
            Trend => AnalysisRequest::Trend {
                schedule_sys_id: validate_optional_sys_id(
                    self.schedule_sys_id.as_deref(),
                    "schedule_sys_id",
                )?,
                last_n_scans: effective_limit(self.last_n_scans, DEFAULT_TREND_SCANS, max_results),
                date_from: self.date_from,
                date_to: self.date_to,
            },
            Coverage => AnalysisRequest::Coverage {
                schedule_sys_id: validate_sys_id(self.schedule_sys_id.as_deref(), "schedule_sys_id")?,
            },
        })
    }
}

/// Reads log rows for one scan, optionally narrowed by an extra condition.
pub(crate) async fn fetch_scan_logs(
    client: &SnowClient,
    scan_sys_id: &str,
    condition: Option<&str>,
    limit: u32,
) -> Result<Vec<LogEntry>, SnowError> {
    let mut query = format!("status={}", scan_sys_id);
    if let Some(condition) = condition {
        query.push('^');
        query.push_str(condition);
    }
    let query = TableQuery::new()
        .with_query(Some(query))
        .with_fields(LogEntry::FIELDS)
        .with_limit(limit);
    Ok(LogEntry::from_wire_all(&client.query_table(LogEntry::TABLE, &query).await?))
}

/// Error and warning rows of one scan.
pub(crate) async fn fetch_problem_logs(
    client: &SnowClient,
    scan_sys_id: &str,
) -> Result<Vec<LogEntry>, SnowError> {
    fetch_scan_logs(client, scan_sys_id, Some("levelINError,Warning"), LOG_LIMIT).await
}

/// Per-level log counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl LogSummary {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let level_count = |level: &str| entries.iter().filter(|e| e.has_level(level)).count();
        LogSummary {
            total: entries.len(),
            errors: level_count("Error"),
            warnings: level_count("Warning"),
            info: level_count("Info"),
        }
    }
}

/// One categorized error or warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedError {
    pub message: String,
    pub level: String,
    pub category: ErrorCategory,
    pub source: String,
}

/// Analyzes scan results, errors, trends and IP coverage.
pub async fn analyze_discovery_results(
    client: &SnowClient,
    input: AnalysisInput,
    max_results: u32,
) -> ToolResult {
    match input.into_request(max_results)? {
        AnalysisRequest::Analyze { scan_sys_id } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Analyzing discovery scan");
            let scan = fetch_scan(client, &scan_sys_id).await?;
            let logs = fetch_scan_logs(client, &scan_sys_id, None, LOG_LIMIT).await?;
            let log_summary = LogSummary::from_entries(&logs);
            let message = format!(
                "Analyzed scan '{}': {} CIs, {} errors",
                scan.name, scan.ci_count, log_summary.errors
            );
            let data = json!({
                "scan_sys_id": scan_sys_id,
                "name": scan.name,
                "state": scan.state,
                "ci_count": scan.ci_count,
                "duration_seconds": scan.duration_seconds(),
                "log_summary": to_data(&log_summary)?,
                "ip_address": scan.ip_address,
                "mid_server": scan.mid_server,
            });
            Ok(ToolOutput::new(data, message))
        }
        AnalysisRequest::Errors { scan_sys_id } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Categorizing discovery errors");
            let logs = fetch_problem_logs(client, &scan_sys_id).await?;
            let errors: Vec<CategorizedError> = logs
                .iter()
                .map(|entry| CategorizedError {
                    message: truncate(&entry.message, ERROR_MESSAGE_LEN),
                    level: entry.level.clone(),
                    category: ErrorCategory::of(&entry.message),
                    source: entry.source.clone(),
                })
                .collect();
            let by_category: Vec<_> = most_common(errors.iter().map(|e| e.category))
                .into_iter()
                .take(TOP_CATEGORIES)
                .map(|(category, count)| json!({ "category": category, "count": count }))
                .collect();
            let message = format!(
                "Found {} error/warning entries in {} categories",
                errors.len(),
                by_category.len()
            );
            let listed: Vec<&CategorizedError> = errors.iter().take(LISTED_ERRORS).collect();
            let data = json!({
                "scan_sys_id": scan_sys_id,
                "total_errors": errors.len(),
                "by_category": by_category,
                "errors": to_data(&listed)?,
            });
            Ok(ToolOutput::new(data, message))
        }
        AnalysisRequest::Trend {
            schedule_sys_id,
            last_n_scans,
            date_from,
            date_to,
        } => {
            tracing::info!(?schedule_sys_id, last_n_scans, "Analyzing discovery trend");
            let mut conditions = Vec::new();
            if let Some(schedule) = schedule_sys_id {
                conditions.push(format!("source={}", schedule));
            }
            if let Some(from) = date_from {
                conditions.push(format!("started>={}", from));
            }
            if let Some(to) = date_to {
                conditions.push(format!("started<={}", to));
            }
            let query = TableQuery::new()
                .with_query(join_conditions(conditions))
                .with_fields(ScanStatus::FIELDS)
                .with_limit(last_n_scans)
                .with_order_by("-sys_created_on");
            let scans = ScanStatus::from_wire_all(&client.query_table(ScanStatus::TABLE, &query).await?);
            if scans.is_empty() {
                return Ok(ToolOutput::new(
                    json!({ "scans": [], "trend": "no_data" }),
                    "No scans found for the specified criteria",
                ));
            }
            let summary = TrendSummary::from_scans(&scans);
            let message = format!(
                "Trend analysis: {} scans, {:.0}% success rate, trend={}",
                summary.scan_count, summary.success_rate_percent, summary.trend_direction
            );
            Ok(ToolOutput::new(to_data(&summary)?, message))
        }
        AnalysisRequest::Coverage { schedule_sys_id } => {
            tracing::info!(schedule_sys_id = %schedule_sys_id, "Analyzing discovery coverage");
            let scan_query = TableQuery::new()
                .with_query(Some(format!("source={}^state=Completed", schedule_sys_id)))
                .with_fields(ScanStatus::FIELDS)
                .with_limit(COVERAGE_SCAN_LIMIT)
                .with_order_by("-sys_created_on");
            let scans = ScanStatus::from_wire_all(&client.query_table(ScanStatus::TABLE, &scan_query).await?);
            let range_query = TableQuery::new()
                .with_query(Some("active=true".to_string()))
                .with_fields(Range::FIELDS)
                .with_limit(COVERAGE_RANGE_LIMIT);
            let ranges = client.query_table(Range::TABLE, &range_query).await?;
            let report = CoverageReport::new(schedule_sys_id, &scans, ranges.len());
            let message = format!(
                "Coverage: {} unique IPs from {} scans, {} configured ranges",
                report.unique_ips_discovered, report.total_scans_analyzed, report.configured_ranges
            );
            Ok(ToolOutput::new(to_data(&report)?, message))
        }
    }
}
