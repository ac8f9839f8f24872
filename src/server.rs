//! MCP server implementation for ServiceNow Discovery.
//!
//! This module defines the `DiscoveryServer` struct that implements the MCP
//! `ServerHandler` trait, exposing Discovery operations as tools. Every
//! discovery tool answers with the same JSON envelope:
//! `{success, data, message, action, error}`.
//!
//! When configuration fails at startup the server still runs. Discovery
//! tools then answer with `CLIENT_NOT_CONFIGURED`, while `get_server_info`
//! and range validation keep working.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Serialize;

use crate::config::Config;
use crate::snow_client::SnowClient;
use crate::tools::{
    self, AnalysisInput, CompareInput, CredentialsInput, DiscoveryStatusInput, HealthInput,
    ListSchedulesInput, PatternsInput, RangeAction, RangesInput, RemediationInput,
    ScheduleScanInput, ToolResponse, ToolResult,
};

/// Name reported by `get_server_info`.
pub const SERVER_NAME: &str = "snow-discovery-agent";

/// Envelope action of `get_discovery_health`, which has no action parameter.
const HEALTH_ACTION: &str = "health";

/// Metadata returned by `get_server_info`.
///
/// Only the instance host name is exposed, never the full URL or any
/// credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub server_name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub instance_hostname: Option<String>,
    pub config_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_error: Option<String>,
    pub client_ready: bool,
}

/// The snow-discovery MCP server.
#[derive(Clone)]
pub struct DiscoveryServer {
    /// Client for the configured instance; `None` in degraded mode.
    client: Option<SnowClient>,
    /// Loaded configuration, if any.
    config: Option<Config>,
    /// Why configuration or client setup failed.
    config_error: Option<String>,
    /// Tool router for MCP tool dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DiscoveryServer {
    /// Creates a fully configured server.
    pub fn new(config: Config, client: SnowClient) -> Self {
        Self {
            client: Some(client),
            config: Some(config),
            config_error: None,
            tool_router: Self::tool_router(),
        }
    }

    /// Creates a server in degraded mode.
    ///
    /// `config` is kept when it loaded but the client could not be built.
    pub fn unconfigured(config: Option<Config>, reason: impl Into<String>) -> Self {
        Self {
            client: None,
            config,
            config_error: Some(reason.into()),
            tool_router: Self::tool_router(),
        }
    }

    /// Builds the server from a configuration attempt, falling back to
    /// degraded mode on any failure.
    pub fn from_config(config: Result<Config, crate::error::SnowError>) -> Self {
        match config {
            Ok(config) => match SnowClient::new(&config) {
                Ok(client) => Self::new(config, client),
                Err(e) => {
                    let reason = e.sanitized_display(&config.password);
                    tracing::warn!(error = %reason, "Failed to create ServiceNow client");
                    Self::unconfigured(Some(config), reason)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Configuration failed; starting in degraded mode");
                Self::unconfigured(None, e.to_string())
            }
        }
    }

    /// True when discovery tools can reach the instance.
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// The ServiceNow client, unless running in degraded mode.
    pub fn client(&self) -> Option<&SnowClient> {
        self.client.as_ref()
    }

    fn max_results(&self) -> u32 {
        self.config
            .as_ref()
            .map(|c| c.max_results)
            .unwrap_or(crate::config::DEFAULT_MAX_RESULTS)
    }

    /// Serializes a tool outcome, scrubbing the password from errors.
    fn respond(&self, action: &str, result: ToolResult) -> String {
        let secret = self
            .client
            .as_ref()
            .map(SnowClient::password_for_sanitization)
            .unwrap_or_default();
        ToolResponse::from_result(action, result, secret).to_json()
    }

    /// The client, or the degraded-mode envelope for `action`.
    fn connected(&self, action: &str) -> Result<&SnowClient, String> {
        self.client.as_ref().ok_or_else(|| {
            let reason = self
                .config_error
                .as_deref()
                .unwrap_or("client not initialized");
            tracing::warn!(action = action, reason = reason, "ServiceNow client not available");
            ToolResponse::not_configured(action, reason).to_json()
        })
    }

    /// Reports server metadata and configuration state.
    pub fn server_status(&self) -> ServerStatus {
        let config = self.config.as_ref();
        ServerStatus {
            server_name: SERVER_NAME,
            version: env!("CARGO_PKG_VERSION"),
            status: "running",
            instance_hostname: config
                .map(|c| c.instance_hostname().unwrap_or_else(|| "unknown".to_string())),
            config_loaded: config.is_some(),
            log_level: config.map(|c| c.log_level.clone()),
            timeout: config.map(|c| c.timeout),
            max_results: config.map(|c| c.max_results),
            config_error: if config.is_some() {
                None
            } else {
                self.config_error.clone()
            },
            client_ready: self.client.is_some(),
        }
    }

    #[tool(description = "Return server metadata: name, version, ServiceNow instance host name, whether configuration loaded and whether the client is ready. Never returns credentials.")]
    fn get_server_info(&self) -> String {
        tracing::debug!("get_server_info tool called");
        serde_json::to_string_pretty(&self.server_status())
            .unwrap_or_else(|e| format!("{{\"status\": \"running\", \"error\": \"{}\"}}", e))
    }

    #[tool(description = "Check discovery scans. Actions: 'get' one scan, 'list' recent scans (filter by state and start date), 'details' for a scan with its log entries, 'poll' for a compact completion check.")]
    async fn get_discovery_status(
        &self,
        Parameters(input): Parameters<DiscoveryStatusInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "get_discovery_status tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::get_discovery_status(client, input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Run discovery. Actions: 'trigger' activates an existing schedule and reports its latest scan, 'create' adds a schedule (name and discover_type required).")]
    async fn schedule_discovery_scan(
        &self,
        Parameters(input): Parameters<ScheduleScanInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "schedule_discovery_scan tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::schedule_discovery_scan(client, input).await;
        self.respond(action, result)
    }

    #[tool(description = "Browse discovery schedules. Actions: 'list' with active, discover_type and name filters, 'get' one schedule, 'summary' of counts by activity and type.")]
    async fn list_discovery_schedules(
        &self,
        Parameters(input): Parameters<ListSchedulesInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "list_discovery_schedules tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::list_discovery_schedules(client, input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Manage discovery credential metadata: 'list', 'get', 'create', 'update', 'delete'. Secret values are never read or returned.")]
    async fn manage_discovery_credentials(
        &self,
        Parameters(input): Parameters<CredentialsInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(action = input.action.as_str(), "manage_discovery_credentials tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::manage_discovery_credentials(client, input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Manage discovery IP ranges: 'list', 'get', 'create', 'update', 'delete', or 'validate' a range definition locally. Types: 'IP Range', 'IP Network' (CIDR), 'IP Address'.")]
    async fn manage_discovery_ranges(
        &self,
        Parameters(input): Parameters<RangesInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "manage_discovery_ranges tool called");
        let action = input.action.as_str();
        if input.action != RangeAction::Validate {
            if let Err(response) = self.connected(action) {
                return response;
            }
        }
        let result =
            tools::manage_discovery_ranges(self.client.as_ref(), input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Inspect CI classification patterns. Actions: 'list', 'get', 'analyze' conflicts for a ci_type, 'coverage' of CI types by active patterns.")]
    async fn get_discovery_patterns(
        &self,
        Parameters(input): Parameters<PatternsInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "get_discovery_patterns tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::get_discovery_patterns(client, input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Analyze discovery results. Actions: 'analyze' a scan, 'errors' categorized by failure type, 'trend' across recent scans, 'coverage' of IPs found by a schedule.")]
    async fn analyze_discovery_results(
        &self,
        Parameters(input): Parameters<AnalysisInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "analyze_discovery_results tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::analyze_discovery_results(client, input, self.max_results()).await;
        self.respond(action, result)
    }

    #[tool(description = "Diagnose scan failures and draft remediation plans: 'diagnose', 'credential_fix', 'network_fix', 'classification_fix', 'bulk_remediate'. Plans are dry runs unless confirm=true; nothing on the instance is modified.")]
    async fn remediate_discovery_failures(
        &self,
        Parameters(input): Parameters<RemediationInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "remediate_discovery_failures tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::remediate_discovery_failures(client, input).await;
        self.respond(action, result)
    }

    #[tool(description = "Score overall discovery health (0-100) over a 'day', 'week' or 'month' from scan outcomes and the share of active schedules, credentials and ranges. Includes recommendations by default.")]
    async fn get_discovery_health(
        &self,
        Parameters(input): Parameters<HealthInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "get_discovery_health tool called");
        if let Err(e) = input.clone().into_request() {
            return self.respond(HEALTH_ACTION, Err(e));
        }
        let client = match self.connected(HEALTH_ACTION) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::get_discovery_health(client, input).await;
        self.respond(HEALTH_ACTION, result)
    }

    #[tool(description = "Compare discovery runs. Actions: 'compare' two scans (CI and error deltas), 'sequential' over the last scans of a schedule.")]
    async fn compare_discovery_runs(
        &self,
        Parameters(input): Parameters<CompareInput>,
    ) -> String {
        let input = input.sanitize();
        tracing::debug!(?input, "compare_discovery_runs tool called");
        let action = input.action.as_str();
        let client = match self.connected(action) {
            Ok(client) => client,
            Err(response) => return response,
        };
        let result = tools::compare_discovery_runs(client, input, self.max_results()).await;
        self.respond(action, result)
    }
}

#[tool_handler]
impl ServerHandler for DiscoveryServer {
    /// Returns server information for the MCP initialize handshake.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "snow-discovery exposes ServiceNow Discovery. \
                 Check scans with get_discovery_status, run them with schedule_discovery_scan \
                 and browse schedules with list_discovery_schedules. \
                 Maintain credentials and IP ranges with manage_discovery_credentials and \
                 manage_discovery_ranges, and inspect patterns with get_discovery_patterns. \
                 For analysis use analyze_discovery_results, compare_discovery_runs and \
                 get_discovery_health; remediate_discovery_failures drafts fixes. \
                 Start with get_server_info to verify configuration."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnowError;
    use crate::tools::{StatusAction, test_support::*};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(instance: &str) -> Config {
        let vars: HashMap<&str, String> = [
            ("SNOW_INSTANCE", instance.to_string()),
            ("SNOW_USERNAME", "admin".to_string()),
            ("SNOW_PASSWORD", "s3cret-pw".to_string()),
        ]
        .into_iter()
        .collect();
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    fn configured_server() -> DiscoveryServer {
        DiscoveryServer::from_config(Ok(test_config("https://dev12345.service-now.com")))
    }

    fn degraded_server() -> DiscoveryServer {
        DiscoveryServer::from_config(Err(SnowError::missing_env("SNOW_INSTANCE")))
    }

    fn parse(response: &str) -> Value {
        serde_json::from_str(response).unwrap()
    }

    fn status_input(action: StatusAction, scan_sys_id: Option<&str>) -> DiscoveryStatusInput {
        DiscoveryStatusInput {
            action,
            scan_sys_id: scan_sys_id.map(str::to_string),
            state: None,
            limit: None,
            date_from: None,
            date_to: None,
        }
    }

    #[test]
    fn test_server_creation() {
        let server = configured_server();
        assert!(server.is_configured());
        let info = server.get_info();
        assert!(info.instructions.is_some());
    }

    #[test]
    fn test_server_info_has_tools_capability() {
        let info = configured_server().get_info();
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_server_info_exposes_hostname_only() {
        let server = configured_server();
        let info = parse(&server.get_server_info());
        assert_eq!(info["server_name"], json!("snow-discovery-agent"));
        assert_eq!(info["status"], json!("running"));
        assert_eq!(info["instance_hostname"], json!("dev12345.service-now.com"));
        assert_eq!(info["config_loaded"], json!(true));
        assert_eq!(info["timeout"], json!(30));
        assert_eq!(info["max_results"], json!(100));
        assert_eq!(info["client_ready"], json!(true));
        assert!(info.get("config_error").is_none());
        let rendered = info.to_string();
        assert!(!rendered.contains("https://"));
        assert!(!rendered.contains("s3cret-pw"));
    }

    #[test]
    fn test_server_info_in_degraded_mode() {
        let info = parse(&degraded_server().get_server_info());
        assert_eq!(info["config_loaded"], json!(false));
        assert_eq!(info["instance_hostname"], Value::Null);
        assert_eq!(info["client_ready"], json!(false));
        assert_eq!(
            info["config_error"],
            json!("configuration error: missing required environment variable: SNOW_INSTANCE")
        );
        assert!(info.get("max_results").is_none());
    }

    #[tokio::test]
    async fn test_degraded_tools_report_client_not_configured() {
        let server = degraded_server();
        let response = parse(
            &server
                .get_discovery_status(Parameters(status_input(StatusAction::List, None)))
                .await,
        );
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["action"], json!("list"));
        assert_eq!(response["error"], json!("CLIENT_NOT_CONFIGURED"));
        assert!(response["message"]
            .as_str()
            .unwrap()
            .starts_with("ServiceNow client not available: "));
    }

    #[tokio::test]
    async fn test_degraded_range_validation_still_runs() {
        let server = degraded_server();
        let input: RangesInput = serde_json::from_value(json!({
            "action": "validate",
            "range_type": "IP Network",
            "range_start": "10.0.0.0/33"
        }))
        .unwrap();
        let response = parse(&server.manage_discovery_ranges(Parameters(input)).await);
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["error"], json!("VALIDATION_ERROR"));
        assert_eq!(response["message"], json!("Validation failed: 1 issue(s)"));
    }

    #[tokio::test]
    async fn test_invalid_period_is_reported_before_client_check() {
        let server = degraded_server();
        let input = HealthInput {
            period: Some("decade".to_string()),
            include_recommendations: None,
        };
        let response = parse(&server.get_discovery_health(Parameters(input)).await);
        assert_eq!(response["action"], json!("health"));
        assert_eq!(response["error"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_validation_error_envelope() {
        let server = configured_server();
        let response = parse(
            &server
                .get_discovery_status(Parameters(status_input(StatusAction::Get, Some("nope"))))
                .await,
        );
        assert_eq!(
            response,
            json!({
                "success": false,
                "data": null,
                "message": "Invalid scan_sys_id format: 'nope'. Expected a 32-character hexadecimal string.",
                "action": "get",
                "error": "VALIDATION_ERROR"
            })
        );
    }

    #[tokio::test]
    async fn test_successful_call_envelope() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/discovery_status/{}", SCAN_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(result(json!({
                "sys_id": SCAN_ID, "name": "Nightly", "state": "Completed"
            }))))
            .mount(&mock)
            .await;

        let server = DiscoveryServer::new(test_config("https://dev12345.service-now.com"), client_for(&mock));
        let response = parse(
            &server
                .get_discovery_status(Parameters(status_input(StatusAction::Poll, Some(SCAN_ID))))
                .await,
        );
        assert_eq!(response["success"], json!(true));
        assert_eq!(response["action"], json!("poll"));
        assert_eq!(response["error"], Value::Null);
        assert_eq!(response["data"]["is_complete"], json!(true));
    }
}
