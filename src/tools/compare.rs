//! The `compare_discovery_runs` tool.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::analysis::fetch_scan_logs;
use super::status::fetch_scan;
use super::validation::validate_sys_id;
use super::{effective_limit, to_data, CompareInput, ToolOutput, ToolResult};
use crate::analytics::{compare_runs, error_counter, sequential_comparisons, ErrorCounter};
use crate::error::SnowError;
use crate::models::{FromWire, ScanStatus};
use crate::query::TableQuery;
use crate::snow_client::SnowClient;

/// Error log rows read per compared scan.
const COMPARE_LOG_LIMIT: u32 = 300;

/// Scans compared sequentially when the caller gives no count.
const DEFAULT_SEQUENTIAL_SCANS: u32 = 5;

/// A validated `compare_discovery_runs` call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareRequest {
    Compare {
        scan_a_sys_id: String,
        scan_b_sys_id: String,
    },
    Sequential {
        schedule_sys_id: String,
        last_n: u32,
    },
}

impl CompareInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<CompareRequest, SnowError> {
        use super::CompareAction::*;
        Ok(match self.action {
            Compare => CompareRequest::Compare {
                scan_a_sys_id: validate_sys_id(self.scan_a_sys_id.as_deref(), "scan_a_sys_id")?,
                scan_b_sys_id: validate_sys_id(self.scan_b_sys_id.as_deref(), "scan_b_sys_id")?,
            },
            Sequential => CompareRequest::Sequential {
                schedule_sys_id: validate_sys_id(self.schedule_sys_id.as_deref(), "schedule_sys_id")?,
                last_n: effective_limit(self.last_n, DEFAULT_SEQUENTIAL_SCANS, max_results),
            },
        })
    }
}

async fn scan_with_errors(
    client: &SnowClient,
    scan_sys_id: &str,
) -> Result<(ScanStatus, ErrorCounter), SnowError> {
    let scan = fetch_scan(client, scan_sys_id).await?;
    let logs = fetch_scan_logs(client, scan_sys_id, Some("level=Error"), COMPARE_LOG_LIMIT).await?;
    Ok((scan, error_counter(&logs)))
}

/// Compares two scans, or consecutive scans of one schedule.
pub async fn compare_discovery_runs(
    client: &SnowClient,
    input: CompareInput,
    max_results: u32,
) -> ToolResult {
    compare_discovery_runs_at(client, input, max_results, Utc::now()).await
}

/// [`compare_discovery_runs`] stamped with `now`.
pub async fn compare_discovery_runs_at(
    client: &SnowClient,
    input: CompareInput,
    max_results: u32,
    now: DateTime<Utc>,
) -> ToolResult {
    match input.into_request(max_results)? {
        CompareRequest::Compare {
            scan_a_sys_id,
            scan_b_sys_id,
        } => {
            tracing::info!(scan_a = %scan_a_sys_id, scan_b = %scan_b_sys_id, "Comparing discovery scans");
            let (scan_a, errors_a) = scan_with_errors(client, &scan_a_sys_id).await?;
            let (scan_b, errors_b) = scan_with_errors(client, &scan_b_sys_id).await?;
            let result = compare_runs(&scan_a, &scan_b, &errors_a, &errors_b, now);
            let message = format!(
                "Compared scan A ({}, {} CIs) vs B ({}, {} CIs): delta_ci={}, delta_errors={}",
                scan_a.state,
                scan_a.ci_count,
                scan_b.state,
                scan_b.ci_count,
                result.delta_ci_count,
                result.delta_error_count
            );
            Ok(ToolOutput::new(to_data(&result)?, message))
        }
        CompareRequest::Sequential {
            schedule_sys_id,
            last_n,
        } => {
            tracing::info!(schedule_sys_id = %schedule_sys_id, last_n, "Comparing sequential scans");
            let query = TableQuery::new()
                .with_query(Some(format!("source={}", schedule_sys_id)))
                .with_fields(ScanStatus::FIELDS)
                .with_limit(last_n)
                .with_order_by("-sys_created_on");
            let scans = ScanStatus::from_wire_all(&client.query_table(ScanStatus::TABLE, &query).await?);

            if scans.len() < 2 {
                return Ok(ToolOutput::new(
                    json!({
                        "schedule_sys_id": schedule_sys_id,
                        "scans_found": scans.len(),
                        "comparisons": [],
                    }),
                    format!(
                        "Need at least 2 scans to compare; found {} for schedule {}",
                        scans.len(),
                        schedule_sys_id
                    ),
                ));
            }

            let report = sequential_comparisons(&scans);
            let message = format!(
                "Sequential comparison: {} scans, {} comparisons, trend={}",
                scans.len(),
                report.comparisons.len(),
                report.trend
            );
            let data = json!({
                "schedule_sys_id": schedule_sys_id,
                "scans_analyzed": scans.len(),
                "trend": report.trend,
                "comparisons": to_data(&report.comparisons)?,
            });
            Ok(ToolOutput::new(data, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_snow_datetime;
    use crate::tools::test_support::*;
    use crate::tools::CompareAction;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input(action: CompareAction) -> CompareInput {
        CompareInput {
            action,
            scan_a_sys_id: None,
            scan_b_sys_id: None,
            schedule_sys_id: None,
            last_n: None,
        }
    }

    async fn mount_scan(server: &MockServer, id: &str, state: &str, ci_count: &str, errors: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!({
                "sys_id": id, "state": state, "ci_count": ci_count
            }))))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_log"))
            .and(query_param("sysparm_query", format!("status={}^level=Error", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(errors)))
            .mount(server)
            .await;
    }

    #[test]
    fn test_compare_requires_both_scans() {
        let mut compare = input(CompareAction::Compare);
        compare.scan_a_sys_id = Some(SCAN_ID.to_string());
        let err = compare.into_request(100).unwrap_err();
        assert_eq!(err.to_string(), "scan_b_sys_id is required for this action");
    }

    #[tokio::test]
    async fn test_compare_partitions_errors() {
        let server = MockServer::start().await;
        mount_scan(
            &server,
            SCAN_ID,
            "Completed",
            "10",
            json!([
                {"level": "Error", "message": "X"},
                {"level": "Error", "message": "Y"}
            ]),
        )
        .await;
        mount_scan(
            &server,
            SCAN_B_ID,
            "Completed",
            "15",
            json!([
                {"level": "Error", "message": "Y"},
                {"level": "Error", "message": "Z"}
            ]),
        )
        .await;

        let mut compare = input(CompareAction::Compare);
        compare.scan_a_sys_id = Some(SCAN_ID.to_string());
        compare.scan_b_sys_id = Some(SCAN_B_ID.to_string());
        let now = parse_snow_datetime("2024-03-08 12:00:00").unwrap();
        let output = compare_discovery_runs_at(&client_for(&server), compare, 100, now)
            .await
            .unwrap();
        assert_eq!(
            output.message,
            "Compared scan A (Completed, 10 CIs) vs B (Completed, 15 CIs): delta_ci=5, delta_errors=0"
        );
        assert_eq!(output.data["errors_new"][0]["message"], json!("Z"));
        assert_eq!(output.data["errors_resolved"][0]["message"], json!("X"));
        assert_eq!(output.data["errors_persistent"][0]["message"], json!("Y"));
    }

    #[tokio::test]
    async fn test_sequential_needs_two_scans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([
                {"sys_id": SCAN_ID, "state": "Completed", "ci_count": "3"}
            ]))))
            .mount(&server)
            .await;

        let mut sequential = input(CompareAction::Sequential);
        sequential.schedule_sys_id = Some(SCHEDULE_ID.to_string());
        let output = compare_discovery_runs(&client_for(&server), sequential, 100).await.unwrap();
        assert_eq!(
            output.message,
            format!("Need at least 2 scans to compare; found 1 for schedule {}", SCHEDULE_ID)
        );
        assert_eq!(output.data["scans_found"], json!(1));
    }

    #[tokio::test]
    async fn test_sequential_trend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_status"))
            .and(query_param(
                "sysparm_query",
                format!("source={}^ORDERBYDESCsys_created_on", SCHEDULE_ID),
            ))
            .and(query_param("sysparm_limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([
                {"sys_id": "3", "state": "Completed", "ci_count": "20"},
                {"sys_id": "2", "state": "Completed", "ci_count": "12"},
                {"sys_id": "1", "state": "Completed", "ci_count": "10"}
            ]))))
            .mount(&server)
            .await;

        let mut sequential = input(CompareAction::Sequential);
        sequential.schedule_sys_id = Some(SCHEDULE_ID.to_string());
        let output = compare_discovery_runs(&client_for(&server), sequential, 100).await.unwrap();
        assert_eq!(
            output.message,
            "Sequential comparison: 3 scans, 2 comparisons, trend=improving"
        );
        assert_eq!(output.data["comparisons"][0]["delta_ci_count"], json!(8));
        assert_eq!(output.data["trend"], json!("improving"));
    }
}
