//! snow-discovery - MCP server for ServiceNow Discovery
//!
//! This binary runs as an MCP server using stdio transport, letting an MCP
//! client inspect and operate ServiceNow Discovery through natural language.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `SNOW_INSTANCE`: Instance URL, e.g. `https://dev12345.service-now.com`
//! - `SNOW_USERNAME`: User for HTTP Basic authentication
//! - `SNOW_PASSWORD`: Password for that user
//!
//! Optional: `SNOW_TIMEOUT` (seconds, default 30), `SNOW_MAX_RESULTS`
//! (default 100) and `SNOW_LOG_LEVEL` (DEBUG, INFO, WARNING, ERROR, CRITICAL).
//!
//! # Usage
//!
//! ```bash
//! SNOW_INSTANCE=https://dev12345.service-now.com \
//! SNOW_USERNAME=admin SNOW_PASSWORD=xxx ./snow-discovery
//! ```

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{fmt, EnvFilter};

use snow_discovery::{config, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    let config = config::Config::from_env();

    // stdout is reserved for MCP JSON-RPC messages
    let default_level = config
        .as_ref()
        .map(|c| c.tracing_level())
        .unwrap_or("info");
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("snow_discovery={}", default_level))
        }))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(
        "Starting snow-discovery MCP server v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Ok(config) = &config {
        tracing::debug!(
            instance = config.instance_hostname().as_deref().unwrap_or("unknown"),
            timeout = config.timeout,
            max_results = config.max_results,
            "Configuration loaded"
        );
    }

    // A broken configuration still starts the server; tools then report
    // CLIENT_NOT_CONFIGURED.
    let server = server::DiscoveryServer::from_config(config);

    if let Some(client) = server.client() {
        tracing::info!("Testing connection to ServiceNow...");
        if let Err(e) = client.test_connection().await {
            tracing::error!(error = %e, "Connection test failed");
            tracing::warn!(
                "Server will start but may not be able to reach ServiceNow. \
                 Check configuration and network connectivity."
            );
        }
    } else {
        tracing::warn!("Starting in degraded mode: discovery tools are unavailable");
    }

    tracing::info!("Server initialized, starting stdio transport");

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })
        .context("Failed to start server")?;

    tracing::info!("Server running, waiting for requests");

    service
        .waiting()
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}
