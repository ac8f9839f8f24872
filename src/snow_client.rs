//! HTTP client for the ServiceNow Table API.
//!
//! This module provides the `SnowClient` struct for making authenticated
//! requests against `{instance}/api/now/table/...` and the aggregate
//! `stats` API.
//!
//! # Retry Logic
//!
//! The client automatically retries transient failures with exponential
//! backoff (`backoff_factor * 2^(n-1)` seconds before retry `n`):
//! - Timeouts, refused connections and other transport errors
//! - HTTP 502/503/504
//!
//! HTTP 429 is never retried; it is surfaced as `SnowError::RateLimit` with
//! the raw `Retry-After` header in its details. When retries run out on a
//! retryable status, that final response is mapped like any other.
//!
//! # Security
//!
//! The password is never logged. Error bodies are scrubbed of it before
//! they end up in an error message.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Details, SnowError};
use crate::models::WireRecord;
use crate::query::TableQuery;

/// Table API base path.
const TABLE_API_PATH: &str = "/api/now/table";

/// Aggregate API base path.
const STATS_API_PATH: &str = "/api/now/stats";

/// Maximum length for error bodies quoted in messages.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_SECS: f64 = 120.0;

/// Tuning knobs for the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Overall request timeout.
    pub timeout: Duration,
    /// Connection timeout. `None` means only `timeout` applies.
    pub connect_timeout: Option<Duration>,
    /// Retries after the first attempt, so `3` allows four requests.
    pub max_retries: u32,
    /// Backoff multiplier in seconds.
    pub backoff_factor: f64,
    /// Idle connections kept per host.
    pub pool_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            connect_timeout: None,
            max_retries: 3,
            backoff_factor: 0.5,
            pool_size: 10,
        }
    }
}

impl ClientOptions {
    /// Options with the timeout taken from configuration.
    pub fn from_config(config: &Config) -> Self {
        ClientOptions {
            timeout: Duration::from_secs(config.timeout),
            ..Self::default()
        }
    }

    /// The sleep before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let secs = (self.backoff_factor * 2f64.powi(exponent)).clamp(0.0, MAX_BACKOFF_SECS);
        Duration::from_secs_f64(secs)
    }

    /// Default retries with no backoff and a short timeout.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(5),
            backoff_factor: 0.0,
            ..Self::default()
        }
    }
}

/// Result of [`SnowClient::test_connection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub success: bool,
    pub instance: String,
    pub status_code: u16,
    pub message: String,
}

/// HTTP client for the ServiceNow REST API.
///
/// Handles authentication, URL construction, retries, response unwrapping
/// and error mapping. Cloning is cheap and shares the connection pool.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = SnowClient::new(&config)?;
///
/// let scans = client
///     .query_table("discovery_status", &TableQuery::new().with_limit(5))
///     .await?;
/// ```
#[derive(Clone)]
pub struct SnowClient {
    /// The underlying HTTP client.
    http: Client,

    /// Instance URL without trailing slash.
    instance: String,

    username: String,

    /// SECURITY: Never log this value!
    password: String,

    options: ClientOptions,
}

impl std::fmt::Debug for SnowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowClient")
            .field("instance", &self.instance)
            .field("username", &self.username)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SnowClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SnowError::Config` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, SnowError> {
        Self::with_options(
            &config.instance,
            &config.username,
            &config.password,
            ClientOptions::from_config(config),
        )
    }

    /// Creates a client with explicit options.
    ///
    /// The instance URL is used as given apart from a trailing slash.
    pub fn with_options(
        instance: &str,
        username: &str,
        password: &str,
        options: ClientOptions,
    ) -> Result<Self, SnowError> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .pool_max_idle_per_host(options.pool_size);
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let http = builder.build().map_err(|e| {
            SnowError::invalid_config(format!("failed to build HTTP client: {}", e))
        })?;

        let instance = instance.trim_end_matches('/').to_string();

        tracing::info!(
            instance = %instance,
            timeout_secs = options.timeout.as_secs(),
            pool_size = options.pool_size,
            max_retries = options.max_retries,
            "ServiceNow client initialized"
        );

        Ok(Self {
            http,
            instance,
            username: username.to_string(),
            password: password.to_string(),
            options,
        })
    }

    /// The instance URL.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Returns the password for sanitization purposes only.
    pub(crate) fn password_for_sanitization(&self) -> &str {
        &self.password
    }

    /// Builds `{instance}/api/now/table/{table}[/{sys_id}]`.
    fn table_url(&self, table: &str, sys_id: Option<&str>) -> String {
        let mut url = format!(
            "{}{}/{}",
            self.instance,
            TABLE_API_PATH,
            urlencoding::encode(table)
        );
        if let Some(sys_id) = sys_id.filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(&urlencoding::encode(sys_id));
        }
        url
    }

    /// Tests connectivity and credentials with a one-row read.
    ///
    /// # Errors
    ///
    /// Returns the mapped error when the instance is unreachable or rejects
    /// the credentials.
    pub async fn test_connection(&self) -> Result<ConnectionInfo, SnowError> {
        tracing::debug!("Testing connection to ServiceNow instance");

        let url = self.table_url("sys_properties", None);
        let params = [("sysparm_limit", "1".to_string())];
        let response = self.send(Method::GET, &url, &params, None).await?;
        let status = response.status();
        self.into_result(&Method::GET, response).await?;

        tracing::info!("Connection test successful");

        Ok(ConnectionInfo {
            success: true,
            instance: self.instance.clone(),
            status_code: status.as_u16(),
            message: "Connection successful".to_string(),
        })
    }

    /// Executes a request with retry logic for transient failures.
    ///
    /// `f` performs one attempt. Transport errors that are retryable and
    /// responses with status 502/503/504 are retried until `max_retries` is
    /// spent; the last outcome is returned unchanged.
    async fn with_retry<F, Fut>(&self, operation: &str, f: F) -> Result<Response, SnowError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, SnowError>>,
    {
        let mut retries = 0u32;

        loop {
            let outcome = f().await;
            let reason = match &outcome {
                Ok(response) if is_retryable_status(response.status()) => {
                    Some(format!("HTTP {}", response.status().as_u16()))
                }
                Err(e) if e.is_retryable() => {
                    Some(SnowError::sanitize_message(&e.to_string(), &self.password))
                }
                _ => None,
            };
            let Some(reason) = reason else {
                return outcome;
            };

            if retries >= self.options.max_retries {
                if retries > 0 {
                    tracing::debug!(
                        operation = operation,
                        attempts = retries + 1,
                        "All retry attempts exhausted"
                    );
                }
                return outcome;
            }

            retries += 1;
            let delay = self.options.backoff(retries);

            tracing::debug!(
                operation = operation,
                retry = retries,
                max_retries = self.options.max_retries,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Retrying after transient error"
            );

            tokio::time::sleep(delay).await;
        }
    }

    /// Makes one request attempt.
    ///
    /// Handles authentication, headers, query parameters and the JSON body.
    /// This is the low-level method without retry logic.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, SnowError> {
        let mut req = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");

        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        req.send().await.map_err(|e| self.transport_error(e))
    }

    /// Makes a request with automatic retry for transient failures.
    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, SnowError> {
        let operation = format!("{} {}", method, url);

        tracing::debug!(method = %method, url = %url, "API request");
        if !params.is_empty() {
            tracing::debug!(params = ?params, "Request params");
        }
        if let Some(Value::Object(fields)) = body {
            let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
            tracing::debug!(keys = ?keys, "Request body keys");
        }

        let response = self
            .with_retry(&operation, || {
                self.send_once(method.clone(), url, params, body)
            })
            .await?;

        tracing::debug!(
            method = %method,
            status = response.status().as_u16(),
            "API response"
        );

        Ok(response)
    }

    /// Converts a transport error into `SnowError::Connection`.
    fn transport_error(&self, e: reqwest::Error) -> SnowError {
        let original = SnowError::sanitize_message(&e.to_string(), &self.password);
        let message = if e.is_timeout() {
            format!("Request timed out: {}", original)
        } else if e.is_connect() {
            format!("Connection failed: {}", original)
        } else {
            format!("Request failed: {}", original)
        };
        tracing::error!(error = %message, "Transport error");
        SnowError::connection(message, original)
    }

    /// Maps a response onto the unwrapped `result` value or an error.
    async fn into_result(&self, method: &Method, response: Response) -> Result<Value, SnowError> {
        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_http_error(method, response).await);
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            let mut details = Details::new();
            details.insert("response_text".to_string(), truncate_chars(&text, MAX_ERROR_BODY_LEN));
            SnowError::api(
                format!("Invalid JSON in response: {}", e),
                Some(status.as_u16()),
                details,
            )
        })?;

        Ok(unwrap_result(body))
    }

    /// Handles HTTP-level errors and converts them to `SnowError`.
    async fn handle_http_error(&self, method: &Method, response: Response) -> SnowError {
        let status = response.status();

        let mut details = Details::new();
        details.insert("url".to_string(), response.url().to_string());
        details.insert("method".to_string(), method.to_string());

        // Kept verbatim; ServiceNow may send seconds or an HTTP date.
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let text = response.text().await.unwrap_or_default();
        let text = SnowError::sanitize_message(&text, &self.password);
        let detail = error_detail(&text);

        let message = if detail.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), detail)
        };

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(retry_after = ?retry_after, "Rate limited by ServiceNow");
                if let Some(retry_after) = retry_after {
                    details.insert("retry_after".to_string(), retry_after);
                }
            }
            s if s.is_server_error() => {
                tracing::warn!(status = %s, "ServiceNow server error");
            }
            _ => {}
        }

        SnowError::from_status(status.as_u16(), message, details)
    }

    /// GETs a collection and returns the unwrapped `result`.
    pub async fn get_records(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SnowError> {
        let url = self.table_url(table, None);
        let response = self.send(Method::GET, &url, params, None).await?;
        self.into_result(&Method::GET, response).await
    }

    /// GETs one record by sys_id and returns the unwrapped `result`.
    pub async fn get_record(
        &self,
        table: &str,
        sys_id: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SnowError> {
        let url = self.table_url(table, Some(sys_id));
        let response = self.send(Method::GET, &url, params, None).await?;
        self.into_result(&Method::GET, response).await
    }

    /// Creates a record.
    pub async fn post(&self, table: &str, body: &Value) -> Result<Value, SnowError> {
        let url = self.table_url(table, None);
        let response = self.send(Method::POST, &url, &[], Some(body)).await?;
        self.into_result(&Method::POST, response).await
    }

    /// Replaces a record.
    pub async fn put(&self, table: &str, sys_id: &str, body: &Value) -> Result<Value, SnowError> {
        let url = self.table_url(table, Some(sys_id));
        let response = self.send(Method::PUT, &url, &[], Some(body)).await?;
        self.into_result(&Method::PUT, response).await
    }

    /// Partially updates a record.
    pub async fn patch(&self, table: &str, sys_id: &str, body: &Value) -> Result<Value, SnowError> {
        let url = self.table_url(table, Some(sys_id));
        let response = self.send(Method::PATCH, &url, &[], Some(body)).await?;
        self.into_result(&Method::PATCH, response).await
    }

    /// Deletes a record. Returns `true` on success; the body is ignored.
    pub async fn delete(&self, table: &str, sys_id: &str) -> Result<bool, SnowError> {
        let url = self.table_url(table, Some(sys_id));
        let response = self.send(Method::DELETE, &url, &[], None).await?;
        if !response.status().is_success() {
            return Err(self.handle_http_error(&Method::DELETE, response).await);
        }
        Ok(true)
    }

    /// Retrieves a single record, optionally restricted to `fields`.
    ///
    /// # Errors
    ///
    /// Returns `SnowError::NotFound` ("Record not found: {table}/{sys_id}")
    /// when the result is neither an object nor a non-empty array.
    pub async fn get_table_record(
        &self,
        table: &str,
        sys_id: &str,
        fields: Option<&[&str]>,
    ) -> Result<WireRecord, SnowError> {
        let params: Vec<(&str, String)> = fields
            .filter(|f| !f.is_empty())
            .map(|f| vec![("sysparm_fields", f.join(","))])
            .unwrap_or_default();

        match self.get_record(table, sys_id, &params).await? {
            Value::Object(record) => Ok(record),
            Value::Array(records) => match records.into_iter().next() {
                Some(Value::Object(record)) => Ok(record),
                _ => Err(self.not_found(table, sys_id)),
            },
            _ => Err(self.not_found(table, sys_id)),
        }
    }

    fn not_found(&self, table: &str, sys_id: &str) -> SnowError {
        tracing::warn!(table = table, sys_id = sys_id, "Record not found");
        SnowError::record_not_found(table, sys_id)
    }

    /// Queries a table. A non-array result yields no rows.
    pub async fn query_table(
        &self,
        table: &str,
        query: &TableQuery,
    ) -> Result<Vec<WireRecord>, SnowError> {
        let result = self.get_records(table, &query.to_params()).await?;
        Ok(match result {
            Value::Array(rows) => rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Counts matching records through the aggregate API.
    ///
    /// # Errors
    ///
    /// Returns an API error ("Failed to parse count response: ...") when
    /// `result.stats.count` is not an integer.
    pub async fn get_record_count(
        &self,
        table: &str,
        query: Option<&str>,
    ) -> Result<u64, SnowError> {
        let url = format!(
            "{}{}/{}",
            self.instance,
            STATS_API_PATH,
            urlencoding::encode(table)
        );
        let mut params = vec![("sysparm_count", "true".to_string())];
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            params.push(("sysparm_query", query.to_string()));
        }

        let response = self.send(Method::GET, &url, &params, None).await?;
        let result = self.into_result(&Method::GET, response).await?;

        parse_count(&result).map_err(|reason| {
            let mut details = Details::new();
            details.insert("table".to_string(), table.to_string());
            details.insert("query".to_string(), query.unwrap_or_default().to_string());
            SnowError::api(
                format!("Failed to parse count response: {}", reason),
                None,
                details,
            )
        })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

/// Unwraps the `{"result": ...}` envelope; other bodies pass through.
fn unwrap_result(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Extracts a human-readable detail from an error body.
///
/// `error.message` when `error` is an object, the string form of `error`
/// otherwise, or the leading characters of a non-JSON body.
fn error_detail(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(body)) => match body.get("error") {
            None => String::new(),
            Some(Value::Object(error)) => error
                .get("message")
                .map(|m| match m {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        },
        _ => truncate_chars(text, MAX_ERROR_BODY_LEN),
    }
}

/// Reads `stats.count`, which arrives as a string or a number.
fn parse_count(result: &Value) -> Result<u64, String> {
    let count = result.get("stats").and_then(|stats| stats.get("count"));
    match count {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| format!("invalid count: {}", n)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid count {:?}: {}", s, e)),
        Some(other) => Err(format!("unexpected count value: {}", other)),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
