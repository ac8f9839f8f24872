//! The `manage_discovery_credentials` tool.
//!
//! Only credential metadata is read or written. Every row is passed through
//! [`strip_secrets`] before it is modelled, and requests only ever select
//! [`SAFE_FIELDS`].

use serde_json::{json, Map, Value};

use super::validation::validate_sys_id;
use super::{bool_condition, effective_limit, into_record, to_data, CredentialsInput, ToolOutput, ToolResult};
use crate::error::SnowError;
use crate::models::{snow_bool, strip_secrets, Credential, FromWire, WireRecord, SAFE_FIELDS};
use crate::query::{join_conditions, TableQuery, DEFAULT_LIMIT};
use crate::snow_client::SnowClient;

/// A validated `manage_discovery_credentials` call.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialRequest {
    List {
        credential_type: Option<String>,
        active: Option<bool>,
        tag: Option<String>,
        limit: u32,
    },
    Get { sys_id: String },
    Create { body: Value, name: String },
    Update { sys_id: String, changes: Value },
    Delete { sys_id: String },
}

impl CredentialsInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<CredentialRequest, SnowError> {
        use super::CredentialAction::*;
        let sys_id = || validate_sys_id(self.sys_id.as_deref(), "sys_id");
        Ok(match self.action {
            List => CredentialRequest::List {
                credential_type: self.filter_type.clone(),
                active: self.filter_active,
                tag: self.filter_tag.clone(),
                limit: effective_limit(self.limit, DEFAULT_LIMIT, max_results),
            },
            Get => CredentialRequest::Get { sys_id: sys_id()? },
            Delete => CredentialRequest::Delete { sys_id: sys_id()? },
            Create => {
                let name = self
                    .name
                    .clone()
                    .ok_or_else(|| SnowError::validation("'name' is required for create action"))?;
                let credential_type = self.credential_type.clone().ok_or_else(|| {
                    SnowError::validation("'credential_type' is required for create action")
                })?;
                let mut body = Map::new();
                body.insert("name".to_string(), json!(name));
                body.insert("type".to_string(), json!(credential_type));
                if let Some(tag) = &self.tag {
                    body.insert("tag".to_string(), json!(tag));
                }
                if let Some(order) = self.order {
                    body.insert("order".to_string(), json!(order.to_string()));
                }
                body.insert(
                    "active".to_string(),
                    json!(snow_bool(self.active.unwrap_or(true))),
                );
                CredentialRequest::Create {
                    body: Value::Object(body),
                    name,
                }
            }
            Update => {
                let sys_id = sys_id()?;
                let changes = self.changes();
                if changes.is_empty() {
                    return Err(SnowError::validation(
                        "At least one field must be provided for update (name, credential_type, tag, order, active)",
                    ));
                }
                CredentialRequest::Update {
                    sys_id,
                    changes: Value::Object(changes),
                }
            }
        })
    }

    /// The wire columns an update sets.
    fn changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(name) = &self.name {
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(credential_type) = &self.credential_type {
            changes.insert("type".to_string(), json!(credential_type));
        }
        if let Some(tag) = &self.tag {
            changes.insert("tag".to_string(), json!(tag));
        }
        if let Some(order) = self.order {
            changes.insert("order".to_string(), json!(order.to_string()));
        }
        if let Some(active) = self.active {
            changes.insert("active".to_string(), json!(snow_bool(active)));
        }
        changes
    }
}

fn safe_credential(record: &WireRecord) -> Credential {
    Credential::from_wire(&strip_secrets(record))
}

/// Lists and maintains discovery credential metadata.
pub async fn manage_discovery_credentials(
    client: &SnowClient,
    input: CredentialsInput,
    max_results: u32,
) -> ToolResult {
    match input.into_request(max_results)? {
        CredentialRequest::List {
            credential_type,
            active,
            tag,
            limit,
        } => {
            tracing::info!(?credential_type, ?active, ?tag, limit, "Listing discovery credentials");
            let mut conditions = Vec::new();
            if let Some(credential_type) = credential_type {
                conditions.push(format!("type={}", credential_type));
            }
            if let Some(active) = active {
                conditions.push(bool_condition("active", active));
            }
            if let Some(tag) = tag {
                conditions.push(format!("tag={}", tag));
            }
            let query = TableQuery::new()
                .with_query(join_conditions(conditions))
                .with_fields(&SAFE_FIELDS)
                .with_limit(limit);
            let records = client.query_table(Credential::TABLE, &query).await?;
            let credentials: Vec<Credential> = records.iter().map(safe_credential).collect();
            Ok(ToolOutput::new(
                to_data(&credentials)?,
                format!("Found {} credential(s)", credentials.len()),
            ))
        }
        CredentialRequest::Get { sys_id } => {
            tracing::info!(sys_id = %sys_id, "Getting discovery credential");
            let record = client
                .get_table_record(Credential::TABLE, &sys_id, Some(&SAFE_FIELDS))
                .await?;
            let credential = safe_credential(&record);
            Ok(ToolOutput::new(
                to_data(&credential)?,
                format!("Retrieved credential '{}' ({})", credential.name, sys_id),
            ))
        }
        CredentialRequest::Create { body, name } => {
            tracing::info!(name = %name, "Creating discovery credential");
            let created = client.post(Credential::TABLE, &body).await?;
            let credential = safe_credential(&into_record(created));
            tracing::info!(sys_id = %credential.sys_id, "Created discovery credential");
            Ok(ToolOutput::new(
                to_data(&credential)?,
                format!("Created credential '{}' ({})", credential.name, credential.sys_id),
            ))
        }
        CredentialRequest::Update { sys_id, changes } => {
            tracing::info!(sys_id = %sys_id, "Updating discovery credential");
            let updated = client.patch(Credential::TABLE, &sys_id, &changes).await?;
            let credential = safe_credential(&into_record(updated));
            Ok(ToolOutput::new(
                to_data(&credential)?,
                format!("Updated credential '{}' ({})", credential.name, sys_id),
            ))
        }
        CredentialRequest::Delete { sys_id } => {
            tracing::info!(sys_id = %sys_id, "Deleting discovery credential");
            client.delete(Credential::TABLE, &sys_id).await?;
            Ok(ToolOutput::new(
                json!({ "sys_id": sys_id }),
                format!("Deleted credential ({})", sys_id),
            ))
        }
    }
}
