//! The `list_discovery_schedules` tool.

use std::collections::BTreeMap;

use serde::Serialize;

use super::validation::validate_sys_id;
use super::{effective_limit, to_data, ListSchedulesInput, ToolOutput, ToolResult};
use crate::error::SnowError;
use crate::models::{FromWire, Schedule};
use crate::query::{build_query, join_conditions, paginate, FilterValue, TableQuery, DEFAULT_LIMIT};
use crate::snow_client::SnowClient;

/// Page size and page ceiling for a schedule summary (at most 500 rows).
const SUMMARY_PAGE_SIZE: u32 = 100;
const SUMMARY_MAX_PAGES: u32 = 5;

/// A validated `list_discovery_schedules` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleListRequest {
    List {
        active: Option<bool>,
        discover_type: Option<String>,
        name_filter: Option<String>,
        limit: u32,
    },
    Get { schedule_sys_id: String },
    Summary,
}

impl ListSchedulesInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<ScheduleListRequest, SnowError> {
        use super::ScheduleListAction::*;
        Ok(match self.action {
            List => ScheduleListRequest::List {
                active: self.active,
                discover_type: self.discover_type,
                name_filter: self.name_filter,
                limit: effective_limit(self.limit, DEFAULT_LIMIT, max_results),
            },
            Get => ScheduleListRequest::Get {
                schedule_sys_id: validate_sys_id(self.schedule_sys_id.as_deref(), "schedule_sys_id")?,
            },
            Summary => ScheduleListRequest::Summary,
        })
    }
}

/// Counts schedules by activity and discovery type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleSummary {
    pub total_schedules: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl ScheduleSummary {
    pub fn from_schedules(schedules: &[Schedule]) -> Self {
        let mut summary = ScheduleSummary {
            total_schedules: schedules.len(),
            ..Default::default()
        };
        for schedule in schedules {
            if schedule.active {
                summary.active += 1;
            } else {
                summary.inactive += 1;
            }
            let discover = if schedule.discover.is_empty() {
                "Unknown"
            } else {
                schedule.discover.as_str()
            };
            *summary.by_type.entry(discover.to_string()).or_default() += 1;
        }
        summary
    }
}

/// Lists, reads and summarizes discovery schedules.
pub async fn list_discovery_schedules(
    client: &SnowClient,
    input: ListSchedulesInput,
    max_results: u32,
) -> ToolResult {
    match input.into_request(max_results)? {
        ScheduleListRequest::List {
            active,
            discover_type,
            name_filter,
            limit,
        } => {
            tracing::info!(?active, ?discover_type, ?name_filter, limit, "Listing discovery schedules");
            let mut conditions: Vec<String> = build_query(&[
                ("active", active.map(FilterValue::Bool)),
                ("discover", discover_type.as_deref().map(FilterValue::Text)),
            ])
            .into_iter()
            .collect();
            if let Some(name) = name_filter {
                conditions.push(format!("nameLIKE{}", name));
            }
            let query = TableQuery::new()
                .with_query(join_conditions(conditions))
                .with_fields(Schedule::FIELDS)
                .with_limit(limit);
            let schedules = Schedule::from_wire_all(&client.query_table(Schedule::TABLE, &query).await?);
            Ok(ToolOutput::new(
                to_data(&schedules)?,
                format!("Found {} schedule(s)", schedules.len()),
            ))
        }
        ScheduleListRequest::Get { schedule_sys_id } => {
            tracing::info!(schedule_sys_id = %schedule_sys_id, "Getting discovery schedule");
            let record = client
                .get_table_record(Schedule::TABLE, &schedule_sys_id, Some(Schedule::FIELDS))
                .await?;
            let schedule = Schedule::from_wire(&record);
            Ok(ToolOutput::new(
                to_data(&schedule)?,
                format!("Retrieved schedule '{}' ({})", schedule.name, schedule_sys_id),
            ))
        }
        ScheduleListRequest::Summary => {
            tracing::info!("Summarizing discovery schedules");
            let query = TableQuery::new()
                .with_fields(Schedule::FIELDS)
                .with_limit(SUMMARY_PAGE_SIZE);
            let records = paginate(client, Schedule::TABLE, &query, SUMMARY_MAX_PAGES).await?;
            let schedules = Schedule::from_wire_all(&records);
            let summary = ScheduleSummary::from_schedules(&schedules);
            let message = format!(
                "Summary: {} schedule(s) ({} active, {} inactive)",
                summary.total_schedules, summary.active, summary.inactive
            );
            Ok(ToolOutput::new(to_data(&summary)?, message))
        }
    }
}
