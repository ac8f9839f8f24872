//! Tool input parameter structs for MCP tools.
//!
//! Every tool takes a flat parameter object with an `action` discriminator.
//! Actions are closed enums, so an unknown action is rejected while the
//! arguments are deserialized, before any tool code runs.
//!
//! # Input Sanitization
//!
//! All input structs implement `sanitize()` which trims whitespace
//! from string fields and drops strings that are blank afterwards.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;

/// Helper function to trim an optional string.
fn trim_option(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Trims every entry of an optional list, dropping blank ones.
fn trim_list(items: &Option<Vec<String>>) -> Option<Vec<String>> {
    items.as_ref().map(|items| {
        items
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// Declares a snake_case action enum with an `as_str` accessor.
macro_rules! action_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// The wire name of the action.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }
    };
}

action_enum!(
    /// Actions of `get_discovery_status`.
    StatusAction {
        Get => "get",
        List => "list",
        Details => "details",
        Poll => "poll",
    }
);

action_enum!(
    /// Actions of `schedule_discovery_scan`.
    ScheduleAction {
        Trigger => "trigger",
        Create => "create",
    }
);

action_enum!(
    /// Actions of `list_discovery_schedules`.
    ScheduleListAction {
        List => "list",
        Get => "get",
        Summary => "summary",
    }
);

action_enum!(
    /// Actions of `manage_discovery_credentials`.
    CredentialAction {
        List => "list",
        Get => "get",
        Create => "create",
        Update => "update",
        Delete => "delete",
    }
);

action_enum!(
    /// Actions of `manage_discovery_ranges`.
    RangeAction {
        List => "list",
        Get => "get",
        Create => "create",
        Update => "update",
        Delete => "delete",
        Validate => "validate",
    }
);

action_enum!(
    /// Actions of `get_discovery_patterns`.
    PatternAction {
        List => "list",
        Get => "get",
        Analyze => "analyze",
        Coverage => "coverage",
    }
);

action_enum!(
    /// Actions of `analyze_discovery_results`.
    AnalysisAction {
        Analyze => "analyze",
        Errors => "errors",
        Trend => "trend",
        Coverage => "coverage",
    }
);

action_enum!(
    /// Actions of `remediate_discovery_failures`.
    RemediationAction {
        Diagnose => "diagnose",
        CredentialFix => "credential_fix",
        NetworkFix => "network_fix",
        ClassificationFix => "classification_fix",
        BulkRemediate => "bulk_remediate",
    }
);

action_enum!(
    /// Actions of `compare_discovery_runs`.
    CompareAction {
        Compare => "compare",
        Sequential => "sequential",
    }
);

/// Input parameters for the get_discovery_status tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DiscoveryStatusInput {
    /// Operation: 'get', 'list', 'details' or 'poll'.
    pub action: StatusAction,

    /// Scan sys_id (required for get, details and poll).
    #[serde(default)]
    pub scan_sys_id: Option<String>,

    /// Filter list by state: Starting, Active, Completed, Cancelled or Error.
    #[serde(default)]
    pub state: Option<String>,

    /// Maximum scans to list (default: 20).
    #[serde(default)]
    pub limit: Option<u32>,

    /// Only scans started on or after this date (YYYY-MM-DD).
    #[serde(default)]
    pub date_from: Option<String>,

    /// Only scans started on or before this date (YYYY-MM-DD).
    #[serde(default)]
    pub date_to: Option<String>,
}

impl DiscoveryStatusInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            scan_sys_id: trim_option(&self.scan_sys_id),
            state: trim_option(&self.state),
            limit: self.limit,
            date_from: trim_option(&self.date_from),
            date_to: trim_option(&self.date_to),
        }
    }
}

/// Input parameters for the schedule_discovery_scan tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScheduleScanInput {
    /// Operation: 'trigger' an existing schedule or 'create' a new one.
    pub action: ScheduleAction,

    /// Schedule sys_id (required for trigger).
    #[serde(default)]
    pub schedule_sys_id: Option<String>,

    /// Schedule name (required for create).
    #[serde(default)]
    pub name: Option<String>,

    /// Discovery type: IP, CI, Network, Cloud or Configuration (required for create).
    #[serde(default)]
    pub discover_type: Option<String>,

    /// sys_ids of discovery ranges to scan.
    #[serde(default)]
    pub ip_ranges: Option<Vec<String>>,

    /// MID server name or sys_id. Selects the 'Specific' MID selection method.
    #[serde(default)]
    pub mid_server: Option<String>,

    /// Maximum run time as HH:MM:SS (default: 02:00:00).
    #[serde(default)]
    pub max_run_time: Option<String>,
}

impl ScheduleScanInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            schedule_sys_id: trim_option(&self.schedule_sys_id),
            name: trim_option(&self.name),
            discover_type: trim_option(&self.discover_type),
            ip_ranges: trim_list(&self.ip_ranges),
            mid_server: trim_option(&self.mid_server),
            max_run_time: trim_option(&self.max_run_time),
        }
    }
}

/// Input parameters for the list_discovery_schedules tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSchedulesInput {
    /// Operation: 'list', 'get' or 'summary'.
    pub action: ScheduleListAction,

    /// Schedule sys_id (required for get).
    #[serde(default)]
    pub schedule_sys_id: Option<String>,

    /// Filter by active flag.
    #[serde(default)]
    pub active: Option<bool>,

    /// Filter by discovery type.
    #[serde(default)]
    pub discover_type: Option<String>,

    /// Filter by a substring of the schedule name.
    #[serde(default)]
    pub name_filter: Option<String>,

    /// Maximum schedules to list (default: 100).
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ListSchedulesInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            schedule_sys_id: trim_option(&self.schedule_sys_id),
            active: self.active,
            discover_type: trim_option(&self.discover_type),
            name_filter: trim_option(&self.name_filter),
            limit: self.limit,
        }
    }
}

/// Input parameters for the manage_discovery_credentials tool.
///
/// Secret values are never accepted or returned; only metadata is managed.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CredentialsInput {
    /// Operation: 'list', 'get', 'create', 'update' or 'delete'.
    pub action: CredentialAction,

    /// Credential sys_id (required for get, update and delete).
    #[serde(default)]
    pub sys_id: Option<String>,

    /// Credential name (required for create).
    #[serde(default)]
    pub name: Option<String>,

    /// Credential type such as SSH, SNMP or Windows (required for create).
    #[serde(default)]
    pub credential_type: Option<String>,

    /// Credential tag.
    #[serde(default)]
    pub tag: Option<String>,

    /// Evaluation order; lower values are tried first.
    #[serde(default)]
    pub order: Option<i64>,

    /// Whether the credential is active (create defaults to true).
    #[serde(default)]
    pub active: Option<bool>,

    /// Filter list by credential type.
    #[serde(default)]
    pub filter_type: Option<String>,

    /// Filter list by active flag.
    #[serde(default)]
    pub filter_active: Option<bool>,

    /// Filter list by tag.
    #[serde(default)]
    pub filter_tag: Option<String>,

    /// Maximum credentials to list (default: 100).
    #[serde(default)]
    pub limit: Option<u32>,
}

impl CredentialsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            sys_id: trim_option(&self.sys_id),
            name: trim_option(&self.name),
            credential_type: trim_option(&self.credential_type),
            tag: trim_option(&self.tag),
            order: self.order,
            active: self.active,
            filter_type: trim_option(&self.filter_type),
            filter_active: self.filter_active,
            filter_tag: trim_option(&self.filter_tag),
            limit: self.limit,
        }
    }
}

/// Input parameters for the manage_discovery_ranges tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RangesInput {
    /// Operation: 'list', 'get', 'create', 'update', 'delete' or 'validate'.
    pub action: RangeAction,

    /// Range sys_id (required for get, update and delete).
    #[serde(default)]
    pub sys_id: Option<String>,

    /// Range name (required for create).
    #[serde(default)]
    pub name: Option<String>,

    /// 'IP Range', 'IP Network' or 'IP Address' (required for create and validate).
    #[serde(default)]
    pub range_type: Option<String>,

    /// Start address, CIDR network or single address.
    #[serde(default)]
    pub range_start: Option<String>,

    /// End address (required for 'IP Range').
    #[serde(default)]
    pub range_end: Option<String>,

    /// Whether the range is active (create defaults to true).
    #[serde(default)]
    pub active: Option<bool>,

    /// Include (true) or exclude (false) the range (create defaults to true).
    #[serde(default)]
    pub include: Option<bool>,

    /// Filter list by range type.
    #[serde(default)]
    pub filter_type: Option<String>,

    /// Filter list by active flag.
    #[serde(default)]
    pub filter_active: Option<bool>,

    /// Maximum ranges to list (default: 100).
    #[serde(default)]
    pub limit: Option<u32>,
}

impl RangesInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            sys_id: trim_option(&self.sys_id),
            name: trim_option(&self.name),
            range_type: trim_option(&self.range_type),
            range_start: trim_option(&self.range_start),
            range_end: trim_option(&self.range_end),
            active: self.active,
            include: self.include,
            filter_type: trim_option(&self.filter_type),
            filter_active: self.filter_active,
            limit: self.limit,
        }
    }
}

/// Input parameters for the get_discovery_patterns tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PatternsInput {
    /// Operation: 'list', 'get', 'analyze' or 'coverage'.
    pub action: PatternAction,

    /// Pattern sys_id (required for get).
    #[serde(default)]
    pub pattern_sys_id: Option<String>,

    /// CI class such as cmdb_ci_linux_server (required for analyze).
    #[serde(default)]
    pub ci_type: Option<String>,

    /// Filter list by active flag.
    #[serde(default)]
    pub active: Option<bool>,

    /// Filter list by a substring of the pattern name.
    #[serde(default)]
    pub name_filter: Option<String>,

    /// Maximum patterns to list (default: 100).
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PatternsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            pattern_sys_id: trim_option(&self.pattern_sys_id),
            ci_type: trim_option(&self.ci_type),
            active: self.active,
            name_filter: trim_option(&self.name_filter),
            limit: self.limit,
        }
    }
}

/// Input parameters for the analyze_discovery_results tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalysisInput {
    /// Operation: 'analyze', 'errors', 'trend' or 'coverage'.
    pub action: AnalysisAction,

    /// Scan sys_id (required for analyze and errors).
    #[serde(default)]
    pub scan_sys_id: Option<String>,

    /// Schedule sys_id (required for coverage, optional filter for trend).
    #[serde(default)]
    pub schedule_sys_id: Option<String>,

    /// Number of recent scans for trend (default: 10).
    #[serde(default)]
    pub last_n_scans: Option<u32>,

    /// Trend scans started on or after this date (YYYY-MM-DD).
    #[serde(default)]
    pub date_from: Option<String>,

    /// Trend scans started on or before this date (YYYY-MM-DD).
    #[serde(default)]
    pub date_to: Option<String>,
}

impl AnalysisInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            scan_sys_id: trim_option(&self.scan_sys_id),
            schedule_sys_id: trim_option(&self.schedule_sys_id),
            last_n_scans: self.last_n_scans,
            date_from: trim_option(&self.date_from),
            date_to: trim_option(&self.date_to),
        }
    }
}

/// Input parameters for the remediate_discovery_failures tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RemediationInput {
    /// Operation: 'diagnose', 'credential_fix', 'network_fix',
    /// 'classification_fix' or 'bulk_remediate'.
    pub action: RemediationAction,

    /// Scan sys_id to diagnose (required for every action).
    #[serde(default)]
    pub scan_sys_id: Option<String>,

    /// Remediation type (required for bulk_remediate).
    #[serde(default)]
    pub remediation_type: Option<String>,

    /// Explicit targets for bulk_remediate; defaults to the scan's error sources.
    #[serde(default)]
    pub target_items: Option<Vec<String>>,

    /// Set to true to mark the plan as queued instead of a dry run (default: false).
    #[serde(default)]
    pub confirm: Option<bool>,
}

impl RemediationInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            scan_sys_id: trim_option(&self.scan_sys_id),
            remediation_type: trim_option(&self.remediation_type),
            target_items: trim_list(&self.target_items),
            confirm: self.confirm,
        }
    }
}

/// Input parameters for the get_discovery_health tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HealthInput {
    /// Analysis window: 'day', 'week' or 'month' (default: week).
    #[serde(default)]
    pub period: Option<String>,

    /// Include actionable recommendations (default: true).
    #[serde(default)]
    pub include_recommendations: Option<bool>,
}

impl HealthInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            period: trim_option(&self.period),
            include_recommendations: self.include_recommendations,
        }
    }
}

/// Input parameters for the compare_discovery_runs tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompareInput {
    /// Operation: 'compare' two scans or 'sequential' over a schedule.
    pub action: CompareAction,

    /// Baseline scan sys_id (required for compare).
    #[serde(default)]
    pub scan_a_sys_id: Option<String>,

    /// Comparison scan sys_id (required for compare).
    #[serde(default)]
    pub scan_b_sys_id: Option<String>,

    /// Schedule sys_id (required for sequential).
    #[serde(default)]
    pub schedule_sys_id: Option<String>,

    /// Number of recent scans for sequential (default: 5).
    #[serde(default)]
    pub last_n: Option<u32>,
}

impl CompareInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            action: self.action,
            scan_a_sys_id: trim_option(&self.scan_a_sys_id),
            scan_b_sys_id: trim_option(&self.scan_b_sys_id),
            schedule_sys_id: trim_option(&self.schedule_sys_id),
            last_n: self.last_n,
        }
    }
}

/// Applies the per-call default and the configured ceiling to a limit.
pub fn effective_limit(requested: Option<u32>, default: u32, max_results: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, max_results.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_trim_option() {
        assert_eq!(trim_option(&Some("  test  ".to_string())), Some("test".to_string()));
        assert_eq!(trim_option(&Some("   ".to_string())), None);
        assert_eq!(trim_option(&None), None);
    }

    #[test]
    fn test_action_deserializes_snake_case() {
        let input: RemediationInput =
            serde_json::from_value(json!({"action": "credential_fix"})).unwrap();
        assert_eq!(input.action, RemediationAction::CredentialFix);
        assert_eq!(input.action.as_str(), "credential_fix");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result: Result<DiscoveryStatusInput, _> =
            serde_json::from_value(json!({"action": "explode"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_fields_default() {
        let input: RangesInput = serde_json::from_value(json!({"action": "list"})).unwrap();
        assert_eq!(input.sys_id, None);
        assert_eq!(input.limit, None);
        assert_eq!(input.active, None);
    }

    #[test]
    fn test_status_sanitize() {
        let input: DiscoveryStatusInput = serde_json::from_value(json!({
            "action": "list",
            "state": "  Completed ",
            "date_from": "   ",
            "limit": 5
        }))
        .unwrap();
        let input = input.sanitize();
        assert_eq!(input.state.as_deref(), Some("Completed"));
        assert_eq!(input.date_from, None);
        assert_eq!(input.limit, Some(5));
    }

    #[test]
    fn test_remediation_sanitize_trims_targets() {
        let input = RemediationInput {
            action: RemediationAction::BulkRemediate,
            scan_sys_id: None,
            remediation_type: Some(" credential ".to_string()),
            target_items: Some(vec![" 10.0.0.1 ".to_string(), "  ".to_string()]),
            confirm: None,
        }
        .sanitize();
        assert_eq!(input.remediation_type.as_deref(), Some("credential"));
        assert_eq!(input.target_items, Some(vec!["10.0.0.1".to_string()]));
    }

    #[test]
    fn test_health_input_accepts_empty_object() {
        let input: HealthInput = serde_json::from_value(json!({})).unwrap();
        assert_eq!(input.period, None);
        assert_eq!(input.include_recommendations, None);
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None, 20, 100), 20);
        assert_eq!(effective_limit(Some(500), 20, 100), 100);
        assert_eq!(effective_limit(Some(0), 20, 100), 1);
        assert_eq!(effective_limit(None, 500, 100), 100);
    }
}
