//! The `remediate_discovery_failures` tool.
//!
//! Every action reads the scan and its error and warning log rows, then
//! reports a plan. Nothing on the instance is modified: `confirm` only
//! switches a plan from dry-run to queued.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value};

use super::analysis::fetch_problem_logs;
use super::status::fetch_scan;
use super::validation::validate_sys_id;
use super::{to_data, RemediationInput, ToolOutput, ToolResult};
use crate::analytics::{is_active_flag, most_common, RemediationCategory};
use crate::error::SnowError;
use crate::models::{coerce_string, strip_secrets, Credential, FromWire, LogEntry, Pattern, Range, ScanStatus, WireRecord, SAFE_FIELDS};
use crate::query::TableQuery;
use crate::snow_client::SnowClient;

const CREDENTIAL_LIMIT: u32 = 100;
const ACTIVE_CONFIG_LIMIT: u32 = 200;
const LISTED_CREDENTIALS: usize = 10;
const LISTED_PLAN_ITEMS: usize = 50;
const TARGET_KEY_LEN: usize = 50;

const CREDENTIAL_DRY_RUN_NOTE: &str = "This is a dry-run. Set confirm=true to execute changes. \
     Credential modifications require explicit confirmation.";
const BULK_DRY_RUN_NOTE: &str =
    "This is a dry-run plan. Set confirm=true to execute. Review the plan items before confirming.";

/// A validated `remediate_discovery_failures` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemediationRequest {
    Diagnose { scan_sys_id: String },
    CredentialFix { scan_sys_id: String, confirm: bool },
    NetworkFix { scan_sys_id: String },
    ClassificationFix { scan_sys_id: String },
    BulkRemediate {
        scan_sys_id: String,
        remediation_type: String,
        target_items: Vec<String>,
        confirm: bool,
    },
}

impl RemediationInput {
    /// Validates the input for its action.
    pub fn into_request(self) -> Result<RemediationRequest, SnowError> {
        use super::RemediationAction::*;
        let scan_sys_id = validate_sys_id(self.scan_sys_id.as_deref(), "scan_sys_id")?;
        let confirm = self.confirm.unwrap_or(false);
        Ok(match self.action {
            Diagnose => RemediationRequest::Diagnose { scan_sys_id },
            CredentialFix => RemediationRequest::CredentialFix { scan_sys_id, confirm },
            NetworkFix => RemediationRequest::NetworkFix { scan_sys_id },
            ClassificationFix => RemediationRequest::ClassificationFix { scan_sys_id },
            BulkRemediate => RemediationRequest::BulkRemediate {
                scan_sys_id,
                remediation_type: self.remediation_type.ok_or_else(|| {
                    SnowError::validation("'remediation_type' is required for bulk_remediate action")
                })?,
                target_items: self.target_items.unwrap_or_default(),
                confirm,
            },
        })
    }
}

/// A suggested change, with the records it concerns when there are any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
}

impl Recommendation {
    fn new(kind: &'static str, description: impl Into<String>) -> Self {
        Recommendation {
            kind,
            description: description.into(),
            items: None,
        }
    }
}

/// One target of a bulk remediation plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanItem {
    pub target: String,
    pub remediation_type: String,
    pub status: &'static str,
}

fn errors_in(logs: &[LogEntry], category: RemediationCategory) -> usize {
    logs.iter()
        .filter(|entry| RemediationCategory::of(&entry.message) == category)
        .count()
}

fn is_inactive_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s == "false",
        Some(Value::Bool(b)) => !b,
        _ => false,
    }
}

/// Diagnosis of a scan: category breakdown, primary cause and next steps.
pub fn diagnose(scan_sys_id: &str, scan: &ScanStatus, logs: &[LogEntry]) -> Value {
    let breakdown = most_common(logs.iter().map(|entry| RemediationCategory::of(&entry.message)));
    let primary_root_cause = breakdown
        .first()
        .map(|(category, _)| category.as_str())
        .unwrap_or("none");
    let has = |category: RemediationCategory| breakdown.iter().any(|(c, _)| *c == category);

    let mut suggestions = Vec::new();
    if has(RemediationCategory::Credential) {
        suggestions.push(
            "Credential failures detected. Run credential_fix action to check credential status and ordering.",
        );
    }
    if has(RemediationCategory::Network) {
        suggestions.push(
            "Network failures detected. Run network_fix action to verify IP ranges and network connectivity.",
        );
    }
    if has(RemediationCategory::Classification) {
        suggestions.push(
            "Classification failures detected. Run classification_fix action to check CI patterns.",
        );
    }

    let error_breakdown: Vec<Value> = breakdown
        .iter()
        .map(|(category, count)| json!({ "category": category, "count": count }))
        .collect();

    json!({
        "scan_sys_id": scan_sys_id,
        "scan_name": scan.name,
        "scan_state": scan.state,
        "total_errors": logs.len(),
        "primary_root_cause": primary_root_cause,
        "error_breakdown": error_breakdown,
        "suggestions": suggestions,
        "affected_ip": scan.ip_address,
    })
}

/// Plan items for `remediation_type`: the explicit targets, or else one per
/// distinct log source (the first 50 message characters when the source is
/// blank).
pub fn plan_items(
    remediation_type: &str,
    target_items: &[String],
    logs: &[LogEntry],
    confirm: bool,
) -> Vec<PlanItem> {
    let status = if confirm { "queued" } else { "planned" };
    let item = |target: String| PlanItem {
        target,
        remediation_type: remediation_type.to_string(),
        status,
    };

    if !target_items.is_empty() {
        return target_items.iter().cloned().map(item).collect();
    }

    let mut seen = HashSet::new();
    logs.iter()
        .map(|entry| {
            if entry.source.is_empty() {
                entry.message.chars().take(TARGET_KEY_LEN).collect()
            } else {
                entry.source.clone()
            }
        })
        .filter(|key: &String| seen.insert(key.clone()))
        .map(item)
        .collect()
}

async fn active_rows(
    client: &SnowClient,
    table: &str,
    fields: &[&str],
) -> Result<Vec<WireRecord>, SnowError> {
    let query = TableQuery::new()
        .with_query(Some("active=true".to_string()))
        .with_fields(fields)
        .with_limit(ACTIVE_CONFIG_LIMIT);
    client.query_table(table, &query).await
}

/// Diagnoses scan failures and drafts remediation plans.
pub async fn remediate_discovery_failures(client: &SnowClient, input: RemediationInput) -> ToolResult {
    let request = input.into_request()?;
    let scan_sys_id = match &request {
        RemediationRequest::Diagnose { scan_sys_id }
        | RemediationRequest::CredentialFix { scan_sys_id, .. }
        | RemediationRequest::NetworkFix { scan_sys_id }
        | RemediationRequest::ClassificationFix { scan_sys_id }
        | RemediationRequest::BulkRemediate { scan_sys_id, .. } => scan_sys_id.clone(),
    };

    let scan = fetch_scan(client, &scan_sys_id).await?;
    let logs = fetch_problem_logs(client, &scan_sys_id).await?;

    match request {
        RemediationRequest::Diagnose { .. } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Diagnosing discovery failures");
            let data = diagnose(&scan_sys_id, &scan, &logs);
            let message = format!(
                "Diagnosis: {} errors, primary cause: {}",
                logs.len(),
                data["primary_root_cause"].as_str().unwrap_or("none")
            );
            Ok(ToolOutput::new(data, message))
        }
        RemediationRequest::CredentialFix { confirm, .. } => {
            tracing::info!(scan_sys_id = %scan_sys_id, confirm, "Checking credential failures");
            let credential_errors = errors_in(&logs, RemediationCategory::Credential);
            let query = TableQuery::new()
                .with_fields(&SAFE_FIELDS)
                .with_limit(CREDENTIAL_LIMIT);
            let credentials: Vec<WireRecord> = client
                .query_table(Credential::TABLE, &query)
                .await?
                .iter()
                .map(strip_secrets)
                .collect();
            let active = credentials.iter().filter(|c| is_active_flag(c.get("active"))).count();
            let inactive: Vec<&WireRecord> = credentials
                .iter()
                .filter(|c| is_inactive_flag(c.get("active")))
                .collect();

            let mut recommendations = Vec::new();
            if !inactive.is_empty() {
                let items = inactive
                    .iter()
                    .take(LISTED_CREDENTIALS)
                    .map(|c| {
                        json!({
                            "sys_id": coerce_string(c.get("sys_id")),
                            "name": coerce_string(c.get("name")),
                        })
                    })
                    .collect();
                recommendations.push(Recommendation {
                    items: Some(items),
                    ..Recommendation::new(
                        "activate_credentials",
                        format!(
                            "{} credential(s) are inactive and may need activation",
                            inactive.len()
                        ),
                    )
                });
            }
            if credential_errors > 0 {
                recommendations.push(Recommendation::new(
                    "check_credential_order",
                    "Credential ordering may need adjustment. Ensure the correct credential type \
                     is tried first for the target devices.",
                ));
            }

            let mut data = json!({
                "scan_sys_id": scan_sys_id,
                "credential_errors": credential_errors,
                "total_credentials": credentials.len(),
                "active_credentials": active,
                "inactive_credentials": inactive.len(),
                "dry_run": !confirm,
                "recommendations": to_data(&recommendations)?,
            });
            if !confirm {
                data["note"] = json!(CREDENTIAL_DRY_RUN_NOTE);
            }
            Ok(ToolOutput::new(
                data,
                format!("Credential analysis: {} credential errors found", credential_errors),
            ))
        }
        RemediationRequest::NetworkFix { .. } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Checking network failures");
            let network_errors = errors_in(&logs, RemediationCategory::Network);
            let ranges = active_rows(client, Range::TABLE, Range::FIELDS).await?;

            let mut recommendations = Vec::new();
            if network_errors > 0 {
                recommendations.push(Recommendation::new(
                    "verify_connectivity",
                    format!(
                        "Network errors detected for IP {}. Verify the target is reachable from the MID server.",
                        scan.ip_address
                    ),
                ));
            }
            if ranges.is_empty() {
                recommendations.push(Recommendation::new(
                    "configure_ranges",
                    "No active discovery ranges configured. Add IP ranges for discovery.",
                ));
            }

            let data = json!({
                "scan_sys_id": scan_sys_id,
                "network_errors": network_errors,
                "configured_ranges": ranges.len(),
                "affected_ip": scan.ip_address,
                "recommendations": to_data(&recommendations)?,
            });
            Ok(ToolOutput::new(
                data,
                format!("Network analysis: {} network errors found", network_errors),
            ))
        }
        RemediationRequest::ClassificationFix { .. } => {
            tracing::info!(scan_sys_id = %scan_sys_id, "Checking classification failures");
            let classification_errors = errors_in(&logs, RemediationCategory::Classification);
            let patterns = active_rows(client, Pattern::TABLE, Pattern::FIELDS).await?;

            let mut recommendations = Vec::new();
            if classification_errors > 0 {
                recommendations.push(Recommendation::new(
                    "review_patterns",
                    format!(
                        "{} classification error(s) found. Review CI patterns for unclassified devices.",
                        classification_errors
                    ),
                ));
            }
            if patterns.is_empty() {
                recommendations.push(Recommendation::new(
                    "create_patterns",
                    "No active CI patterns configured. Create patterns for target device types.",
                ));
            }

            let data = json!({
                "scan_sys_id": scan_sys_id,
                "classification_errors": classification_errors,
                "active_patterns": patterns.len(),
                "recommendations": to_data(&recommendations)?,
            });
            Ok(ToolOutput::new(
                data,
                format!(
                    "Classification analysis: {} classification errors found",
                    classification_errors
                ),
            ))
        }
        RemediationRequest::BulkRemediate {
            remediation_type,
            target_items,
            confirm,
            ..
        } => {
            tracing::info!(
                scan_sys_id = %scan_sys_id,
                remediation_type = %remediation_type,
                confirm,
                "Generating bulk remediation plan"
            );
            let items = plan_items(&remediation_type, &target_items, &logs, confirm);
            let listed: Vec<&PlanItem> = items.iter().take(LISTED_PLAN_ITEMS).collect();
            let mut data = json!({
                "scan_sys_id": scan_sys_id,
                "remediation_type": remediation_type,
                "total_items": items.len(),
                "dry_run": !confirm,
                "items": to_data(&listed)?,
            });
            if !confirm {
                data["note"] = json!(BULK_DRY_RUN_NOTE);
            }
            Ok(ToolOutput::new(
                data,
                format!(
                    "Bulk remediation plan: {} items ({})",
                    items.len(),
                    remediation_type
                ),
            ))
        }
    }
}
