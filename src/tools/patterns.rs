//! The `get_discovery_patterns` tool.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use super::validation::validate_sys_id;
use super::{bool_condition, effective_limit, to_data, PatternsInput, ToolOutput, ToolResult};
use crate::error::SnowError;
use crate::models::{FromWire, Pattern};
use crate::query::{join_conditions, TableQuery, DEFAULT_LIMIT};
use crate::snow_client::SnowClient;

/// Patterns read for a single CI type analysis.
const ANALYZE_LIMIT: u32 = 100;

/// Patterns read to build the coverage map.
const COVERAGE_LIMIT: u32 = 500;

/// A validated `get_discovery_patterns` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternRequest {
    List {
        ci_type: Option<String>,
        active: Option<bool>,
        name_filter: Option<String>,
        limit: u32,
    },
    Get { pattern_sys_id: String },
    Analyze { ci_type: String },
    Coverage,
}

impl PatternsInput {
    /// Validates the input for its action.
    pub fn into_request(self, max_results: u32) -> Result<PatternRequest, SnowError> {
        use super::PatternAction::*;
        Ok(match self.action {
            List => PatternRequest::List {
                ci_type: self.ci_type,
                active: self.active,
                name_filter: self.name_filter,
                limit: effective_limit(self.limit, DEFAULT_LIMIT, max_results),
            },
            Get => PatternRequest::Get {
                pattern_sys_id: validate_sys_id(self.pattern_sys_id.as_deref(), "pattern_sys_id")?,
            },
            Analyze => PatternRequest::Analyze {
                ci_type: self.ci_type.ok_or_else(|| {
                    SnowError::validation("'ci_type' is required for analyze action")
                })?,
            },
            Coverage => PatternRequest::Coverage,
        })
    }
}

/// Two active patterns competing for one CI type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternConflict {
    pub pattern_a: String,
    pub pattern_b: String,
    pub reason: String,
}

/// Every pair of active patterns, in list order.
pub fn pattern_conflicts(ci_type: &str, patterns: &[Pattern]) -> Vec<PatternConflict> {
    let active: Vec<&Pattern> = patterns.iter().filter(|p| p.active).collect();
    let mut conflicts = Vec::new();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            conflicts.push(PatternConflict {
                pattern_a: a.name.clone(),
                pattern_b: b.name.clone(),
                reason: format!("Both active patterns target CI type '{}'", ci_type),
            });
        }
    }
    conflicts
}

/// Pattern counts for one CI type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCoverage {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

/// Which CI types have at least one active pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternCoverage {
    pub total_patterns: usize,
    pub total_ci_types: usize,
    pub covered_types: usize,
    pub uncovered_types: usize,
    pub by_type: BTreeMap<String, TypeCoverage>,
    pub types_without_active_patterns: Vec<String>,
}

impl PatternCoverage {
    pub fn from_patterns(patterns: &[Pattern]) -> Self {
        let mut by_type: BTreeMap<String, TypeCoverage> = BTreeMap::new();
        for pattern in patterns {
            let ci_type = if pattern.ci_type.is_empty() {
                "Unknown"
            } else {
                pattern.ci_type.as_str()
            };
            let entry = by_type.entry(ci_type.to_string()).or_default();
            entry.total += 1;
            if pattern.active {
                entry.active += 1;
            } else {
                entry.inactive += 1;
            }
        }

        let types_without_active_patterns: Vec<String> = by_type
            .iter()
            .filter(|(_, coverage)| coverage.active == 0)
            .map(|(ci_type, _)| ci_type.clone())
            .collect();
        let total_ci_types = by_type.len();
        let uncovered_types = types_without_active_patterns.len();

        PatternCoverage {
            total_patterns: patterns.len(),
            total_ci_types,
            covered_types: total_ci_types - uncovered_types,
            uncovered_types,
            by_type,
            types_without_active_patterns,
        }
    }
}

/// Lists classification patterns and analyzes their coverage.
pub async fn get_discovery_patterns(
    client: &SnowClient,
    input: PatternsInput,
    max_results: u32,
) -> ToolResult {
    match input.into_request(max_results)? {
        PatternRequest::List {
            ci_type,
            active,
            name_filter,
            limit,
        } => {
            tracing::info!(?ci_type, ?active, ?name_filter, limit, "Listing discovery patterns");
            let mut conditions = Vec::new();
            if let Some(ci_type) = ci_type {
                conditions.push(format!("ci_type={}", ci_type));
            }
            if let Some(active) = active {
                conditions.push(bool_condition("active", active));
            }
            if let Some(name) = name_filter {
                conditions.push(format!("nameLIKE{}", name));
            }
            let query = TableQuery::new()
                .with_query(join_conditions(conditions))
                .with_fields(Pattern::FIELDS)
                .with_limit(limit);
            let patterns = Pattern::from_wire_all(&client.query_table(Pattern::TABLE, &query).await?);
            Ok(ToolOutput::new(
                to_data(&patterns)?,
                format!("Found {} pattern(s)", patterns.len()),
            ))
        }
        PatternRequest::Get { pattern_sys_id } => {
            tracing::info!(pattern_sys_id = %pattern_sys_id, "Getting discovery pattern");
            let record = client
                .get_table_record(Pattern::TABLE, &pattern_sys_id, Some(Pattern::FIELDS))
                .await?;
            let pattern = Pattern::from_wire(&record);
            Ok(ToolOutput::new(
                to_data(&pattern)?,
                format!("Retrieved pattern '{}' ({})", pattern.name, pattern_sys_id),
            ))
        }
        PatternRequest::Analyze { ci_type } => {
            tracing::info!(ci_type = %ci_type, "Analyzing patterns for CI type");
            let query = TableQuery::new()
                .with_query(Some(format!("ci_type={}", ci_type)))
                .with_fields(Pattern::FIELDS)
                .with_limit(ANALYZE_LIMIT);
            let patterns = Pattern::from_wire_all(&client.query_table(Pattern::TABLE, &query).await?);
            let active = patterns.iter().filter(|p| p.active).count();
            let conflicts = pattern_conflicts(&ci_type, &patterns);
            let message = format!(
                "Analysis for '{}': {} pattern(s), {} conflict(s)",
                ci_type,
                patterns.len(),
                conflicts.len()
            );
            let data = json!({
                "ci_type": ci_type,
                "total_patterns": patterns.len(),
                "active_patterns": active,
                "inactive_patterns": patterns.len() - active,
                "conflicts": to_data(&conflicts)?,
                "patterns": to_data(&patterns)?,
            });
            Ok(ToolOutput::new(data, message))
        }
        PatternRequest::Coverage => {
            tracing::info!("Computing pattern coverage");
            let query = TableQuery::new()
                .with_fields(Pattern::FIELDS)
                .with_limit(COVERAGE_LIMIT);
            let patterns = Pattern::from_wire_all(&client.query_table(Pattern::TABLE, &query).await?);
            let coverage = PatternCoverage::from_patterns(&patterns);
            let message = format!(
                "Coverage: {}/{} CI types have active patterns",
                coverage.covered_types, coverage.total_ci_types
            );
            Ok(ToolOutput::new(to_data(&coverage)?, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::*;
    use crate::tools::PatternAction;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pattern(name: &str, ci_type: &str, active: bool) -> Pattern {
        Pattern {
            sys_id: String::new(),
            name: name.to_string(),
            active,
            ci_type: ci_type.to_string(),
            criteria: String::new(),
            description: String::new(),
        }
    }

    fn input(action: PatternAction) -> PatternsInput {
        PatternsInput {
            action,
            pattern_sys_id: None,
            ci_type: None,
            active: None,
            name_filter: None,
            limit: None,
        }
    }

    #[test]
    fn test_conflicts_pair_every_active_pattern() {
        let patterns = vec![
            pattern("A", "cmdb_ci_linux_server", true),
            pattern("B", "cmdb_ci_linux_server", false),
            pattern("C", "cmdb_ci_linux_server", true),
            pattern("D", "cmdb_ci_linux_server", true),
        ];
        let conflicts = pattern_conflicts("cmdb_ci_linux_server", &patterns);
        let pairs: Vec<(&str, &str)> = conflicts
            .iter()
            .map(|c| (c.pattern_a.as_str(), c.pattern_b.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "C"), ("A", "D"), ("C", "D")]);
        assert_eq!(
            conflicts[0].reason,
            "Both active patterns target CI type 'cmdb_ci_linux_server'"
        );
    }

    #[test]
    fn test_coverage_lists_uncovered_types() {
        let patterns = vec![
            pattern("A", "cmdb_ci_linux_server", true),
            pattern("B", "cmdb_ci_win_server", false),
            pattern("C", "", false),
        ];
        let coverage = PatternCoverage::from_patterns(&patterns);
        assert_eq!(coverage.total_ci_types, 3);
        assert_eq!(coverage.covered_types, 1);
        assert_eq!(coverage.uncovered_types, 2);
        assert_eq!(
            coverage.types_without_active_patterns,
            vec!["Unknown".to_string(), "cmdb_ci_win_server".to_string()]
        );
    }

    #[test]
    fn test_analyze_requires_ci_type() {
        let err = input(PatternAction::Analyze).into_request(100).unwrap_err();
        assert_eq!(err.to_string(), "'ci_type' is required for analyze action");
    }

    #[tokio::test]
    async fn test_analyze_reports_conflicts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci_pattern"))
            .and(query_param("sysparm_query", "ci_type=cmdb_ci_linux_server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([
                {"sys_id": "1", "name": "Linux A", "active": "true", "ci_type": "cmdb_ci_linux_server"},
                {"sys_id": "2", "name": "Linux B", "active": "true", "ci_type": "cmdb_ci_linux_server"},
                {"sys_id": "3", "name": "Linux C", "active": "false", "ci_type": "cmdb_ci_linux_server"}
            ]))))
            .mount(&server)
            .await;

        let mut analyze = input(PatternAction::Analyze);
        analyze.ci_type = Some("cmdb_ci_linux_server".to_string());
        let output = get_discovery_patterns(&client_for(&server), analyze, 100).await.unwrap();
        assert_eq!(
            output.message,
            "Analysis for 'cmdb_ci_linux_server': 3 pattern(s), 1 conflict(s)"
        );
        assert_eq!(output.data["active_patterns"], json!(2));
        assert_eq!(output.data["inactive_patterns"], json!(1));
    }

    #[tokio::test]
    async fn test_coverage_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci_pattern"))
            .and(query_param("sysparm_limit", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!([
                {"sys_id": "1", "name": "A", "active": "true", "ci_type": "cmdb_ci_linux_server"},
                {"sys_id": "2", "name": "B", "active": "false", "ci_type": "cmdb_ci_netgear"}
            ]))))
            .mount(&server)
            .await;

        let output = get_discovery_patterns(&client_for(&server), input(PatternAction::Coverage), 100)
            .await
            .unwrap();
        assert_eq!(output.message, "Coverage: 1/2 CI types have active patterns");
        assert_eq!(
            output.data["by_type"]["cmdb_ci_netgear"],
            json!({"total": 1, "active": 0, "inactive": 1})
        );
    }
}
