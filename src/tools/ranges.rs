//! The `manage_discovery_ranges` tool.

use serde_json::{json, Map, Value};

use super::validation::{quoted_list, validate_cidr, validate_ip_address, validate_ip_range, validate_sys_id};
use super::{bool_condition, effective_limit, into_record, to_data, RangeAction, RangesInput, ToolOutput, ToolResult};
use crate::error::{codes, SnowError};
use crate::models::{snow_bool, FromWire, Range, RANGE_TYPES};
use crate::query::{join_conditions, TableQuery, DEFAULT_LIMIT};
use crate::snow_client::SnowClient;

const IP_RANGE: &str = "IP Range";
const IP_NETWORK: &str = "IP Network";

/// A validated `manage_discovery_ranges` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeRequest {
    /// Checked locally; `issues` is empty when the definition is sound.
    Validate {
        issues: Vec<String>,
        range_type: Option<String>,
        range_start: Option<String>,
        range_end: Option<String>,
    },
    List {
        range_type: Option<String>,
        active: Option<bool>,
        limit: u32,
    },
    Get { sys_id: String },
    Create { name: String, body: Value },
    Update { sys_id: String, changes: Value },
    Delete { sys_id: String },
}

/// Checks `range_start` against what `range_type` stores there.
fn check_start(range_type: Option<&str>, range_start: &str) -> Result<(), SnowError> {
    match range_type {
        Some(IP_NETWORK) | None => validate_cidr(range_start, "range_start").map(|_| ()),
        Some(_) => validate_ip_address(range_start, "range_start").map(|_| ()),
    }
}

fn check_type(range_type: &str) -> Result<(), SnowError> {
    if RANGE_TYPES.contains(&range_type) {
        Ok(())
    } else {
        Err(SnowError::validation(format!(
            "Invalid range_type: '{}'. Valid types: {}",
            range_type,
            quoted_list(&RANGE_TYPES)
        )))
    }
}

impl RangesInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<RangeRequest, SnowError> {
        let sys_id = || validate_sys_id(self.sys_id.as_deref(), "sys_id");
        Ok(match self.action {
            RangeAction::List => RangeRequest::List {
                range_type: self.filter_type.clone(),
                active: self.filter_active,
                limit: effective_limit(self.limit, DEFAULT_LIMIT, max_results),
            },
            RangeAction::Get => RangeRequest::Get { sys_id: sys_id()? },
            RangeAction::Delete => RangeRequest::Delete { sys_id: sys_id()? },
            RangeAction::Create => {
                let name = self
                    .name
                    .clone()
                    .ok_or_else(|| SnowError::validation("'name' is required for create action"))?;
                let range_type = self.range_type.clone().ok_or_else(|| {
                    SnowError::validation("'range_type' is required for create action")
                })?;
                check_type(&range_type)?;
                let range_start = self.range_start.clone().ok_or_else(|| {
                    SnowError::validation("'range_start' is required for create action")
                })?;
                check_start(Some(&range_type), &range_start)?;
                if range_type == IP_RANGE {
                    let range_end = self.range_end.as_deref().ok_or_else(|| {
                        SnowError::validation("'range_end' is required for 'IP Range' type")
                    })?;
                    validate_ip_range(&range_start, range_end)?;
                }

                let mut body = Map::new();
                body.insert("name".to_string(), json!(name));
                body.insert("type".to_string(), json!(range_type));
                body.insert("range_start".to_string(), json!(range_start));
                if let Some(range_end) = &self.range_end {
                    body.insert("range_end".to_string(), json!(range_end));
                }
                body.insert("active".to_string(), json!(snow_bool(self.active.unwrap_or(true))));
                body.insert("include".to_string(), json!(snow_bool(self.include.unwrap_or(true))));
                RangeRequest::Create {
                    name,
                    body: Value::Object(body),
                }
            }
            RangeAction::Update => {
                let sys_id = sys_id()?;
                if let Some(range_type) = &self.range_type {
                    check_type(range_type)?;
                }
                if let Some(range_start) = &self.range_start {
                    check_start(self.range_type.as_deref(), range_start)?;
                }
                if let Some(range_end) = &self.range_end {
                    validate_ip_address(range_end, "range_end")?;
                }
                if self.range_type.as_deref() == Some(IP_RANGE) {
                    if let (Some(start), Some(end)) = (&self.range_start, &self.range_end) {
                        validate_ip_range(start, end)?;
                    }
                }
                let changes = self.changes();
                if changes.is_empty() {
                    return Err(SnowError::validation(
                        "At least one field must be provided for update",
                    ));
                }
                RangeRequest::Update {
                    sys_id,
                    changes: Value::Object(changes),
                }
            }
            RangeAction::Validate => RangeRequest::Validate {
                issues: self.range_issues(),
                range_type: self.range_type,
                range_start: self.range_start,
                range_end: self.range_end,
            },
        })
    }

    fn changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        let text_fields = [
            ("name", &self.name),
            ("type", &self.range_type),
            ("range_start", &self.range_start),
            ("range_end", &self.range_end),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                changes.insert(column.to_string(), json!(value));
            }
        }
        for (column, flag) in [("active", self.active), ("include", self.include)] {
            if let Some(flag) = flag {
                changes.insert(column.to_string(), json!(snow_bool(flag)));
            }
        }
        changes
    }

    /// Every problem with the range definition, in the order found.
    pub fn range_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        // The start is only checked against a known type.
        let range_type = match self.range_type.as_deref() {
            None => {
                issues.push("range_type is required".to_string());
                None
            }
            Some(t) => match check_type(t) {
                Ok(()) => Some(t),
                Err(e) => {
                    issues.push(e.to_string());
                    None
                }
            },
        };

        let start_ok = match (self.range_start.as_deref(), range_type) {
            (None, _) => {
                issues.push("range_start is required".to_string());
                false
            }
            (Some(_), None) => false,
            (Some(start), Some(t)) => match check_start(Some(t), start) {
                Ok(()) => true,
                Err(e) => {
                    issues.push(e.to_string());
                    false
                }
            },
        };

        if range_type == Some(IP_RANGE) {
            match self.range_end.as_deref() {
                None => issues.push("range_end is required for 'IP Range' type".to_string()),
                Some(end) => match validate_ip_address(end, "range_end") {
                    Err(e) => issues.push(e.to_string()),
                    Ok(_) if start_ok => {
                        if let Some(Err(e)) = self.range_start.as_deref().map(|s| validate_ip_range(s, end)) {
                            issues.push(e.to_string());
                        }
                    }
                    Ok(_) => {}
                },
            }
        }

        issues
    }
}

/// Reports the outcome of a local range check.
fn validation_outcome(
    issues: Vec<String>,
    range_type: Option<String>,
    range_start: Option<String>,
    range_end: Option<String>,
) -> ToolOutput {
    if issues.is_empty() {
        ToolOutput::new(
            json!({
                "validated": {
                    "range_type": range_type,
                    "range_start": range_start,
                    "range_end": range_end,
                }
            }),
            "Validation passed",
        )
    } else {
        tracing::debug!(issues = issues.len(), "Range validation failed");
        let message = format!("Validation failed: {} issue(s)", issues.len());
        ToolOutput::rejected(json!({ "issues": issues }), message, codes::VALIDATION)
    }
}

/// Lists, maintains and validates discovery IP ranges.
///
/// `validate` runs without a client; every other action fails with
/// `CLIENT_NOT_CONFIGURED` when `client` is `None`.
pub async fn manage_discovery_ranges(
    client: Option<&SnowClient>,
    input: RangesInput,
    max_results: u32,
) -> ToolResult {
    let connected = || {
        client.ok_or_else(|| {
            SnowError::ClientNotConfigured("ServiceNow client is not initialized".to_string())
        })
    };

    match input.into_request(max_results)? {
        RangeRequest::Validate {
            issues,
            range_type,
            range_start,
            range_end,
        } => Ok(validation_outcome(issues, range_type, range_start, range_end)),
        RangeRequest::List {
            range_type,
            active,
            limit,
        } => {
            let client = connected()?;
            tracing::info!(?range_type, ?active, limit, "Listing discovery ranges");
            let mut conditions = Vec::new();
            if let Some(range_type) = range_type {
                conditions.push(format!("type={}", range_type));
            }
            if let Some(active) = active {
                conditions.push(bool_condition("active", active));
            }
            let query = TableQuery::new()
                .with_query(join_conditions(conditions))
                .with_fields(Range::FIELDS)
                .with_limit(limit);
            let ranges = Range::from_wire_all(&client.query_table(Range::TABLE, &query).await?);
            Ok(ToolOutput::new(
                to_data(&ranges)?,
                format!("Found {} range(s)", ranges.len()),
            ))
        }
        RangeRequest::Get { sys_id } => {
            let client = connected()?;
            tracing::info!(sys_id = %sys_id, "Getting discovery range");
            let record = client
                .get_table_record(Range::TABLE, &sys_id, Some(Range::FIELDS))
                .await?;
            let range = Range::from_wire(&record);
            Ok(ToolOutput::new(
                to_data(&range)?,
                format!("Retrieved range '{}' ({})", range.name, sys_id),
            ))
        }
        RangeRequest::Create { name, body } => {
            let client = connected()?;
            tracing::info!(name = %name, "Creating discovery range");
            let range = Range::from_wire(&into_record(client.post(Range::TABLE, &body).await?));
            tracing::info!(sys_id = %range.sys_id, "Created discovery range");
            Ok(ToolOutput::new(
                to_data(&range)?,
                format!("Created range '{}' ({})", range.name, range.sys_id),
            ))
        }
        RangeRequest::Update { sys_id, changes } => {
            let client = connected()?;
            tracing::info!(sys_id = %sys_id, "Updating discovery range");
            let updated = client.patch(Range::TABLE, &sys_id, &changes).await?;
            let range = Range::from_wire(&into_record(updated));
            Ok(ToolOutput::new(
                to_data(&range)?,
                format!("Updated range '{}' ({})", range.name, sys_id),
            ))
        }
        RangeRequest::Delete { sys_id } => {
            let client = connected()?;
            tracing::info!(sys_id = %sys_id, "Deleting discovery range");
            client.delete(Range::TABLE, &sys_id).await?;
            Ok(ToolOutput::new(
                json!({ "sys_id": sys_id }),
                format!("Deleted range ({})", sys_id),
            ))
        }
    }
}
