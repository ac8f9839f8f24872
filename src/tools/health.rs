//! The `get_discovery_health` tool.

use chrono::{DateTime, Utc};

use super::{to_data, HealthInput, ToolOutput, ToolResult};
use crate::analytics::{compute_health, top_errors, ComponentHealth, Period, ScanHealth, SubMetrics};
use crate::error::SnowError;
use crate::models::{
    coerce_string, Credential, FromWire, LogEntry, Range, ScanStatus, Schedule, WireRecord,
};
use crate::query::TableQuery;
use crate::snow_client::SnowClient;

/// Rows read per table for the health window.
const HEALTH_ROW_LIMIT: u32 = 500;

/// Error log rows read for the top-errors list.
const HEALTH_LOG_LIMIT: u32 = 200;

const SCAN_FIELDS: &[&str] = &["sys_id", "name", "state", "started", "completed", "ci_count", "ip_address"];
const SCHEDULE_FIELDS: &[&str] = &["sys_id", "name", "active", "discover"];
const TYPED_FIELDS: &[&str] = &["sys_id", "name", "active", "type"];
const LOG_FIELDS: &[&str] = &["sys_id", "message", "level"];

impl HealthInput {
    /// The analysis window and whether to add recommendations.
    pub fn into_request(self) -> Result<(Period, bool), SnowError> {
        let period = match self.period.as_deref() {
            Some(period) => period.parse()?,
            None => Period::default(),
        };
        Ok((period, self.include_recommendations.unwrap_or(true)))
    }
}

async fn rows(
    client: &SnowClient,
    table: &str,
    query: Option<String>,
    fields: &[&str],
    limit: u32,
) -> Result<Vec<WireRecord>, SnowError> {
    let query = TableQuery::new()
        .with_query(query)
        .with_fields(fields)
        .with_limit(limit);
    client.query_table(table, &query).await
}

/// Scores discovery health over a day, week or month.
pub async fn get_discovery_health(client: &SnowClient, input: HealthInput) -> ToolResult {
    get_discovery_health_at(client, input, Utc::now()).await
}

/// [`get_discovery_health`] with the window ending at `now`.
pub async fn get_discovery_health_at(
    client: &SnowClient,
    input: HealthInput,
    now: DateTime<Utc>,
) -> ToolResult {
    let (period, include_recommendations) = input.into_request()?;
    let since = period.since(now);
    tracing::info!(period = %period, since = %since, "Computing discovery health");

    let scan_rows = rows(
        client,
        ScanStatus::TABLE,
        Some(format!("started>={}", since)),
        SCAN_FIELDS,
        HEALTH_ROW_LIMIT,
    )
    .await?;
    let scans = ScanStatus::from_wire_all(&scan_rows);
    let scan_health = ScanHealth::from_scans(&scans);

    let schedules = rows(client, Schedule::TABLE, None, SCHEDULE_FIELDS, HEALTH_ROW_LIMIT).await?;
    let credentials = rows(client, Credential::TABLE, None, TYPED_FIELDS, HEALTH_ROW_LIMIT).await?;
    let ranges = rows(client, Range::TABLE, None, TYPED_FIELDS, HEALTH_ROW_LIMIT).await?;

    let errors = if scan_health.failed > 0 {
        let logs = rows(
            client,
            LogEntry::TABLE,
            Some(format!("created_on>={}^level=Error", since)),
            LOG_FIELDS,
            HEALTH_LOG_LIMIT,
        )
        .await?;
        let messages: Vec<String> = logs
            .iter()
            .map(|row| match row.get("message") {
                None => "Unknown error".to_string(),
                Some(message) => coerce_string(Some(message)),
            })
            .collect();
        top_errors(messages.iter().map(String::as_str))
    } else {
        Vec::new()
    };

    let sub_metrics = SubMetrics {
        scan_health,
        schedule_health: ComponentHealth::from_rows(&schedules),
        credential_health: ComponentHealth::from_rows(&credentials),
        range_health: ComponentHealth::from_rows(&ranges),
    };
    let report = compute_health(period, sub_metrics, errors, include_recommendations, now);
    tracing::info!(
        score = report.summary.health_score,
        status = %report.status,
        "Computed discovery health"
    );

    let message = format!(
        "Discovery health: {}/100 ({}) for {}",
        report.summary.health_score, report.status, period
    );
    Ok(ToolOutput::new(to_data(&report)?, message))
}
