//! The `get_discovery_status` tool.

use serde_json::json;

use super::validation::{quoted_list, validate_sys_id};
use super::{effective_limit, to_data, DiscoveryStatusInput, ToolOutput, ToolResult};
use crate::error::SnowError;
use crate::models::{FromWire, LogEntry, ScanStatus, SCAN_STATES};
use crate::query::{join_conditions, TableQuery};
use crate::snow_client::SnowClient;

/// Default number of scans listed.
pub const DEFAULT_STATUS_LIMIT: u32 = 20;

/// Log rows returned with scan details.
const DETAIL_LOG_LIMIT: u32 = 100;

const DETAIL_LOG_FIELDS: &[&str] = &["sys_id", "level", "message", "source", "created_on"];

/// A validated `get_discovery_status` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusRequest {
    Get { scan_sys_id: String },
    List {
        state: Option<String>,
        limit: u32,
        date_from: Option<String>,
        date_to: Option<String>,
    },
    Details { scan_sys_id: String },
    Poll { scan_sys_id: String },
}

impl DiscoveryStatusInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<StatusRequest, SnowError> {
        use super::StatusAction::*;
        let scan_id = || validate_sys_id(self.scan_sys_id.as_deref(), "scan_sys_id");
        Ok(match self.action {
            Get => StatusRequest::Get { scan_sys_id: scan_id()? },
            Details => StatusRequest::Details { scan_sys_id: scan_id()? },
            Poll => StatusRequest::Poll { scan_sys_id: scan_id()? },
            List => {
                if let Some(state) = self.state.as_deref() {
                    if !SCAN_STATES.contains(&state) {
                        return Err(SnowError::validation(format!(
                            "Invalid state filter: '{}'. Valid states: {}",
                            state,
                            quoted_list(&SCAN_STATES)
                        )));
                    }
                }
                StatusRequest::List {
                    state: self.state,
                    limit: effective_limit(self.limit, DEFAULT_STATUS_LIMIT, max_results),
                    date_from: self.date_from,
                    date_to: self.date_to,
                }
            }
        })
    }
}

/// Checks the status and results of discovery scans.
pub async fn get_discovery_status(
    client: &SnowClient,
    input: DiscoveryStatusInput,
    max_results: u32,
) -> ToolResult {
    match input.into_request(max_results)? {
        StatusRequest::Get { scan_sys_id } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Getting discovery status");
            let status = fetch_scan(client, &scan_sys_id).await?;
            Ok(ToolOutput::new(
                to_data(&status)?,
                format!("Retrieved scan status '{}' (state={})", status.name, status.state),
            ))
        }
        StatusRequest::List {
            state,
            limit,
            date_from,
            date_to,
        } => {
            tracing::info!(?state, limit, ?date_from, ?date_to, "Listing discovery scans");
            let mut conditions = Vec::new();
            if let Some(state) = state {
                conditions.push(format!("state={}", state));
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
                .with_limit(limit)
                .with_order_by("-sys_created_on");
            let records = client.query_table(ScanStatus::TABLE, &query).await?;
            let scans = ScanStatus::from_wire_all(&records);
            tracing::info!(count = scans.len(), "Listed discovery scans");
            Ok(ToolOutput::new(
                to_data(&scans)?,
                format!("Found {} scan(s)", scans.len()),
            ))
        }
        StatusRequest::Details { scan_sys_id } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Getting discovery scan details");
            let status = fetch_scan(client, &scan_sys_id).await?;
            let query = TableQuery::new()
                .with_query(Some(format!("status={}", scan_sys_id)))
                .with_fields(DETAIL_LOG_FIELDS)
                .with_limit(DETAIL_LOG_LIMIT)
                .with_order_by("-created_on");
            let log_entries = client.query_table(LogEntry::TABLE, &query).await?;
            let count = log_entries.len();
            let data = json!({
                "status": to_data(&status)?,
                "log_entries": log_entries,
                "log_entry_count": count,
                "duration_seconds": status.duration_seconds(),
            });
            Ok(ToolOutput::new(
                data,
                format!("Retrieved details for scan '{}' ({} log entries)", status.name, count),
            ))
        }
        StatusRequest::Poll { scan_sys_id } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Polling discovery scan");
            let status = fetch_scan(client, &scan_sys_id).await?;
            let is_complete = status.is_complete();
            let data = json!({
                "sys_id": status.sys_id,
                "state": status.state,
                "is_complete": is_complete,
                "ci_count": status.ci_count,
                "started": status.started,
                "completed": status.completed,
            });
            Ok(ToolOutput::new(
                data,
                format!(
                    "Scan '{}' state: {} (complete={})",
                    status.name, status.state, is_complete
                ),
            ))
        }
    }
}

/// Reads one `discovery_status` row.
pub(crate) async fn fetch_scan(client: &SnowClient, scan_sys_id: &str) -> Result<ScanStatus, SnowError> {
    let record = client
        .get_table_record(ScanStatus::TABLE, scan_sys_id, Some(ScanStatus::FIELDS))
        .await?;
    Ok(ScanStatus::from_wire(&record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::*;
    use crate::tools::StatusAction;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input(action: StatusAction) -> DiscoveryStatusInput {
        DiscoveryStatusInput {
            action,
            scan_sys_id: None,
            state: None,
            limit: None,
            date_from: None,
            date_to: None,
        }
    }

    fn scan_row() -> serde_json::Value {
        json!({
            "sys_id": SCAN_ID,
            "name": "Nightly",
            "state": "Completed",
            "started": "2024-01-15 10:00:00",
            "completed": "2024-01-15 10:05:00",
            "ci_count": "42"
        })
    }

    #[test]
    fn test_get_requires_scan_id() {
        let err = input(StatusAction::Get).into_request(100).unwrap_err();
        assert_eq!(err.to_string(), "scan_sys_id is required for this action");
    }

    #[test]
    fn test_list_rejects_unknown_state() {
        let mut list = input(StatusAction::List);
        list.state = Some("Done".to_string());
        let err = list.into_request(100).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state filter: 'Done'. Valid states: ['Active', 'Cancelled', 'Completed', 'Error', 'Starting']"
        );
    }

    #[test]
    fn test_list_limit_is_capped() {
        let mut list = input(StatusAction::List);
        list.limit = Some(1000);
        match list.into_request(50).unwrap() {
            StatusRequest::List { limit, .. } => assert_eq!(limit, 50),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_returns_typed_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", SCAN_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(scan_row())))
            .mount(&server)
            .await;

        let mut get = input(StatusAction::Get);
        get.scan_sys_id = Some(SCAN_ID.to_string());
        let output = get_discovery_status(&client_for(&server), get, 100).await.unwrap();
        assert_eq!(output.message, "Retrieved scan status 'Nightly' (state=Completed)");
        assert_eq!(output.data["ci_count"], json!(42));
    }

    #[tokio::test]
    async fn test_list_builds_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_status"))
            .and(query_param(
                "sysparm_query",
                "state=Error^started>=2024-01-01^ORDERBYDESCsys_created_on",
            ))
            .and(query_param("sysparm_limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([scan_row()]))))
            .expect(1)
            .mount(&server)
            .await;

        let mut list = input(StatusAction::List);
        list.state = Some("Error".to_string());
        list.date_from = Some("2024-01-01".to_string());
        let output = get_discovery_status(&client_for(&server), list, 100).await.unwrap();
        assert_eq!(output.message, "Found 1 scan(s)");
    }

    #[tokio::test]
    async fn test_details_includes_logs_and_duration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", SCAN_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(scan_row())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_log"))
            .and(query_param("sysparm_query", format!("status={}^ORDERBYDESCcreated_on", SCAN_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([
                {"sys_id": "1", "level": "Error", "message": "boom"},
                {"sys_id": "2", "level": "Info", "message": "ok"}
            ]))))
            .mount(&server)
            .await;

        let mut details = input(StatusAction::Details);
        details.scan_sys_id = Some(SCAN_ID.to_string());
        let output = get_discovery_status(&client_for(&server), details, 100).await.unwrap();
        assert_eq!(output.message, "Retrieved details for scan 'Nightly' (2 log entries)");
        assert_eq!(output.data["duration_seconds"], json!(300.0));
        assert_eq!(output.data["log_entry_count"], json!(2));
    }

    #[tokio::test]
    async fn test_poll_reports_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", SCAN_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!({
                "sys_id": SCAN_ID, "name": "Adhoc", "state": "Active"
            }))))
            .mount(&server)
            .await;

        let mut poll = input(StatusAction::Poll);
        poll.scan_sys_id = Some(SCAN_ID.to_string());
        let output = get_discovery_status(&client_for(&server), poll, 100).await.unwrap();
        assert_eq!(output.message, "Scan 'Adhoc' state: Active (complete=false)");
        assert_eq!(output.data["is_complete"], json!(false));
        assert_eq!(output.data["started"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_get_missing_record_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", SCAN_ID)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "No Record found"}
            })))
            .mount(&server)
            .await;

        let mut get = input(StatusAction::Get);
        get.scan_sys_id = Some(SCAN_ID.to_string());
        let err = get_discovery_status(&client_for(&server), get, 100).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
