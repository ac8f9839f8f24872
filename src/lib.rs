//! # snow-discovery
//!
//! snow-discovery is an MCP (Model Context Protocol) server for ServiceNow
//! Discovery.
//!
//! It exposes Discovery operations as MCP tools, so an AI assistant can
//! check scans and run them, maintain their configuration and diagnose
//! failures through natural language.
//!
//! ## Features
//!
//! - **Scans**: Status, details and completion polling; trigger or create schedules
//! - **Configuration**: Schedules, credentials (metadata only) and IP ranges
//! - **Patterns**: Classification pattern listing, conflict and coverage analysis
//! - **Analytics**: Error categorization, trends, run comparison and a health score
//! - **Remediation**: Diagnoses and dry-run remediation plans
//! - **Error handling**: Automatic retry for transient failures with exponential backoff
//! - **Security**: Passwords and credential secrets never appear in logs or responses
//!
//! ## Architecture
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error taxonomy with machine-readable codes and sanitization
//! - [`snow_client`] - HTTP client for the ServiceNow Table API
//! - [`query`] - Encoded query construction and pagination
//! - [`models`] - Typed projections of the Discovery tables
//! - [`analytics`] - Pure aggregation: categorization, trends, coverage, health
//! - [`tools`] - Tool inputs and per-tool action handlers
//! - [`server`] - MCP server implementation with tool routing
//!
//! ## Configuration
//!
//! Required:
//! - `SNOW_INSTANCE`: Instance URL, must start with `https://`
//! - `SNOW_USERNAME` / `SNOW_PASSWORD`: HTTP Basic credentials
//!
//! Optional:
//! - `SNOW_TIMEOUT`: Request timeout in seconds (default 30)
//! - `SNOW_MAX_RESULTS`: Ceiling for caller-supplied limits (default 100)
//! - `SNOW_LOG_LEVEL`: DEBUG, INFO, WARNING, ERROR or CRITICAL (default INFO)
//! - `RUST_LOG`: Overrides the log filter (e.g., `snow_discovery=debug`)
//!
//! When configuration fails the server still starts. `get_server_info`
//! reports the reason and the other tools answer `CLIENT_NOT_CONFIGURED`.
//!
//! ## Example
//!
//! Using the [`SnowClient`](snow_client::SnowClient) directly:
//!
//! ```ignore
//! use snow_discovery::config::Config;
//! use snow_discovery::query::{build_query, TableQuery};
//! use snow_discovery::snow_client::SnowClient;
//!
//! async fn example() -> Result<(), snow_discovery::error::SnowError> {
//!     let config = Config::from_env()?;
//!     let client = SnowClient::new(&config)?;
//!
//!     let query = TableQuery::new()
//!         .with_query(build_query(&[("state", Some("Error".into()))]))
//!         .with_order_by("-sys_created_on")
//!         .with_limit(10);
//!
//!     for scan in client.query_table("discovery_status", &query).await? {
//!         println!("{:?}", scan.get("name"));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod server;
pub mod snow_client;
pub mod tools;
