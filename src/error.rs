//! Error types for the snow-discovery MCP server.
//!
//! This module defines `SnowError`, the closed error taxonomy used by every
//! layer of the crate. Transport failures are mapped onto it by the client,
//! tools add validation and configuration kinds, and the server turns any of
//! them into the uniform tool envelope.
//!
//! # Security
//!
//! Error messages built from upstream responses can echo request data. Use
//! `sanitized_display()` with the configured password before logging or
//! returning a message produced outside this crate.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

/// Free-form error context such as the request URL and method.
pub type Details = BTreeMap<String, String>;

/// Machine-readable error codes carried in tool responses.
pub mod codes {
    /// HTTP 401 from the instance.
    pub const AUTHENTICATION: &str = "AUTHENTICATION_ERROR";
    /// HTTP 403 from the instance.
    pub const PERMISSION: &str = "PERMISSION_ERROR";
    /// HTTP 404 or an empty single-record lookup.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// HTTP 429 from the instance.
    pub const RATE_LIMIT: &str = "RATE_LIMIT_ERROR";
    /// HTTP 5xx or any other unmapped non-success status.
    pub const API: &str = "SERVICENOW_API_ERROR";
    /// Transport failure before a response was received.
    pub const CONNECTION: &str = "CONNECTION_ERROR";
    /// Invalid configuration.
    pub const CONFIGURATION: &str = "CONFIGURATION_ERROR";
    /// Local parameter validation failure.
    pub const VALIDATION: &str = "VALIDATION_ERROR";
    /// The server started without a usable client.
    pub const CLIENT_NOT_CONFIGURED: &str = "CLIENT_NOT_CONFIGURED";
    /// Anything outside the taxonomy.
    pub const UNEXPECTED: &str = "UNEXPECTED_ERROR";
}

/// Unified error type for all snow-discovery operations.
///
/// The first six variants mirror how the ServiceNow REST API fails; the
/// remaining ones are raised locally before or around a request.
#[derive(Error, Debug)]
pub enum SnowError {
    /// Authentication failed (HTTP 401).
    #[error("{message}")]
    Authentication {
        /// Human-readable description.
        message: String,
        /// Request context.
        details: Details,
    },

    /// The account lacks the required role (HTTP 403).
    #[error("{message}")]
    Permission {
        /// Human-readable description.
        message: String,
        /// Request context.
        details: Details,
    },

    /// The table or record does not exist (HTTP 404).
    #[error("{message}")]
    NotFound {
        /// Human-readable description.
        message: String,
        /// Request context.
        details: Details,
    },

    /// The instance is throttling requests (HTTP 429).
    ///
    /// `details["retry_after"]` holds the raw `Retry-After` header when the
    /// instance sent one.
    #[error("{message}")]
    RateLimit {
        /// Human-readable description.
        message: String,
        /// Request context.
        details: Details,
    },

    /// Server error or any other unmapped non-success response.
    #[error("{message}")]
    Api {
        /// Human-readable description.
        message: String,
        /// The HTTP status, when a response was received.
        status_code: Option<u16>,
        /// Request context.
        details: Details,
    },

    /// Timeout, refused connection, DNS failure or other transport error.
    #[error("{message}")]
    Connection {
        /// Human-readable description.
        message: String,
        /// Contains `original_error`.
        details: Details,
    },

    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input validation failed before any request was made.
    #[error("{0}")]
    Validation(String),

    /// No client is available because configuration failed at startup.
    #[error("{0}")]
    ClientNotConfigured(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnowError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        SnowError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SnowError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SnowError::Validation(message.into())
    }

    /// Creates a not-found error for a single record lookup.
    pub fn record_not_found(table: &str, sys_id: &str) -> Self {
        let mut details = Details::new();
        details.insert("table".to_string(), table.to_string());
        details.insert("sys_id".to_string(), sys_id.to_string());
        SnowError::NotFound {
            message: format!("Record not found: {}/{}", table, sys_id),
            details,
        }
    }

    /// Creates an API error that did not come from a status code.
    pub fn api(message: impl Into<String>, status_code: Option<u16>, details: Details) -> Self {
        SnowError::Api {
            message: message.into(),
            status_code,
            details,
        }
    }

    /// Creates a connection error, keeping the transport error text.
    pub fn connection(message: impl Into<String>, original_error: impl Into<String>) -> Self {
        let mut details = Details::new();
        details.insert("original_error".to_string(), original_error.into());
        SnowError::Connection {
            message: message.into(),
            details,
        }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    ///
    /// 401, 403, 404 and 429 get their own kinds; everything else,
    /// including every 5xx, becomes `Api`.
    pub fn from_status(status: u16, message: impl Into<String>, details: Details) -> Self {
        let message = message.into();
        match status {
            401 => SnowError::Authentication { message, details },
            403 => SnowError::Permission { message, details },
            404 => SnowError::NotFound { message, details },
            429 => SnowError::RateLimit { message, details },
            _ => SnowError::Api {
                message,
                status_code: Some(status),
                details,
            },
        }
    }

    /// Returns the machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SnowError::Authentication { .. } => codes::AUTHENTICATION,
            SnowError::Permission { .. } => codes::PERMISSION,
            SnowError::NotFound { .. } => codes::NOT_FOUND,
            SnowError::RateLimit { .. } => codes::RATE_LIMIT,
            SnowError::Api { .. } => codes::API,
            SnowError::Connection { .. } => codes::CONNECTION,
            SnowError::Config(_) => codes::CONFIGURATION,
            SnowError::Validation(_) => codes::VALIDATION,
            SnowError::ClientNotConfigured(_) => codes::CLIENT_NOT_CONFIGURED,
            SnowError::Serialization(_) => codes::UNEXPECTED,
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SnowError::Authentication { .. } => Some(401),
            SnowError::Permission { .. } => Some(403),
            SnowError::NotFound { .. } => Some(404),
            SnowError::RateLimit { .. } => Some(429),
            SnowError::Api { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Returns the detail map, empty for kinds that carry none.
    #[must_use]
    pub fn details(&self) -> Option<&Details> {
        match self {
            SnowError::Authentication { details, .. }
            | SnowError::Permission { details, .. }
            | SnowError::NotFound { details, .. }
            | SnowError::RateLimit { details, .. }
            | SnowError::Api { details, .. }
            | SnowError::Connection { details, .. } => Some(details),
            _ => None,
        }
    }

    /// Returns true for errors raised by the instance or the network, as
    /// opposed to ones raised locally.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        self.details().is_some()
    }

    /// Returns true if this error is transient and the request should be retried.
    ///
    /// Retryable errors are transport failures and HTTP 502/503/504.
    /// Rate limiting is deliberately not retried; the caller decides.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SnowError::Connection { .. } => true,
            SnowError::Api {
                status_code: Some(status),
                ..
            } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Serializes to `{error, error_code, status_code?, details?}`.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        let mut out = json!({
            "error": self.to_string(),
            "error_code": self.error_code(),
        });
        if let Some(status) = self.status_code() {
            out["status_code"] = json!(status);
        }
        if let Some(details) = self.details().filter(|d| !d.is_empty()) {
            out["details"] = json!(details);
        }
        out
    }

    /// Removes every occurrence of `secret` from a message.
    #[must_use]
    pub fn sanitize_message(message: &str, secret: &str) -> String {
        if secret.is_empty() {
            return message.to_string();
        }
        message.replace(secret, "[REDACTED]")
    }

    /// Creates a sanitized version of this error's display message.
    #[must_use]
    pub fn sanitized_display(&self, secret: &str) -> String {
        Self::sanitize_message(&self.to_string(), secret)
    }
}
