//! The `schedule_discovery_scan` tool.

use serde_json::{json, Value};

use super::validation::{quoted_list, validate_sys_id};
use super::{into_record, to_data, ScheduleScanInput, ToolOutput, ToolResult};
use crate::error::SnowError;
use crate::models::{snow_bool, FromWire, ScanStatus, Schedule, DEFAULT_MAX_RUN_TIME, DISCOVER_TYPES};
use crate::query::TableQuery;
use crate::snow_client::SnowClient;

/// A validated `schedule_discovery_scan` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleRequest {
    Trigger { schedule_sys_id: String },
    Create(NewSchedule),
}

/// Parameters of a schedule to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
    pub name: String,
    pub discover_type: String,
    pub ip_ranges: Vec<String>,
    pub mid_server: Option<String>,
    pub max_run_time: String,
}

impl NewSchedule {
    /// The `discovery_schedule` row to POST.
    fn body(&self) -> Value {
        let mut body = json!({
            "name": self.name,
            "discover": self.discover_type,
            "active": snow_bool(true),
            "max_run_time": self.max_run_time,
        });
        if let Some(mid_server) = &self.mid_server {
            body["mid_select_method"] = json!("Specific");
            body["mid_server"] = json!(mid_server);
        }
        body
    }
}

impl ScheduleScanInput {
    /// Validates the input for its action.
    pub fn into_request(self) -> Result<ScheduleRequest, SnowError> {
        use super::ScheduleAction::*;
        match self.action {
            Trigger => Ok(ScheduleRequest::Trigger {
                schedule_sys_id: validate_sys_id(self.schedule_sys_id.as_deref(), "schedule_sys_id")?,
            }),
            Create => {
                let name = self
                    .name
                    .ok_or_else(|| SnowError::validation("'name' is required for create action"))?;
                let discover_type = self.discover_type.ok_or_else(|| {
                    SnowError::validation("'discover_type' is required for create action")
                })?;
                if !DISCOVER_TYPES.contains(&discover_type.as_str()) {
                    return Err(SnowError::validation(format!(
                        "Invalid discover_type: '{}'. Valid types: {}",
                        discover_type,
                        quoted_list(&DISCOVER_TYPES)
                    )));
                }
                let ip_ranges = self
                    .ip_ranges
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(i, id)| validate_sys_id(Some(id), &format!("ip_ranges[{}]", i)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ScheduleRequest::Create(NewSchedule {
                    name,
                    discover_type,
                    ip_ranges,
                    mid_server: self.mid_server,
                    max_run_time: self
                        .max_run_time
                        .unwrap_or_else(|| DEFAULT_MAX_RUN_TIME.to_string()),
                }))
            }
        }
    }
}

/// Triggers or creates discovery schedules.
pub async fn schedule_discovery_scan(client: &SnowClient, input: ScheduleScanInput) -> ToolResult {
    match input.into_request()? {
        ScheduleRequest::Trigger { schedule_sys_id } => trigger(client, &schedule_sys_id).await,
        ScheduleRequest::Create(new_schedule) => create(client, &new_schedule).await,
    }
}

async fn trigger(client: &SnowClient, schedule_sys_id: &str) -> ToolResult {
    tracing::info!(schedule_sys_id = %schedule_sys_id, "Triggering discovery schedule");

    let record = client
        .get_table_record(Schedule::TABLE, schedule_sys_id, Some(Schedule::FIELDS))
        .await?;
    let schedule = Schedule::from_wire(&record);

    // The instance starts a scan when the schedule transitions to active.
    client
        .patch(Schedule::TABLE, schedule_sys_id, &json!({ "active": snow_bool(true) }))
        .await?;
    tracing::info!(schedule_sys_id = %schedule_sys_id, name = %schedule.name, "Activated discovery schedule");

    let query = TableQuery::new()
        .with_query(Some(format!("source={}", schedule_sys_id)))
        .with_fields(ScanStatus::FIELDS)
        .with_limit(1)
        .with_order_by("-sys_created_on");
    let latest_scan = client
        .query_table(ScanStatus::TABLE, &query)
        .await?
        .first()
        .map(ScanStatus::from_wire);

    Ok(ToolOutput::new(
        json!({
            "schedule": to_data(&schedule)?,
            "latest_scan": to_data(&latest_scan)?,
        }),
        format!("Triggered discovery schedule '{}' ({})", schedule.name, schedule_sys_id),
    ))
}

async fn create(client: &SnowClient, new_schedule: &NewSchedule) -> ToolResult {
    tracing::info!(
        name = %new_schedule.name,
        discover = %new_schedule.discover_type,
        ranges = new_schedule.ip_ranges.len(),
        "Creating discovery schedule"
    );

    let created = client.post(Schedule::TABLE, &new_schedule.body()).await?;
    let schedule = Schedule::from_wire(&into_record(created));
    tracing::info!(sys_id = %schedule.sys_id, name = %schedule.name, "Created discovery schedule");

    Ok(ToolOutput::new(
        to_data(&schedule)?,
        format!("Created discovery schedule '{}' ({})", schedule.name, schedule.sys_id),
    ))
}
