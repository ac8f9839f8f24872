//! The uniform result envelope every tool returns.

use serde::Serialize;
use serde_json::Value;

use crate::error::{codes, SnowError};

/// What a tool action produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub data: Value,
    pub message: String,
    /// Set when the action ran but reports a failure with data attached,
    /// such as range validation issues.
    pub error: Option<&'static str>,
}

impl ToolOutput {
    pub fn new(data: Value, message: impl Into<String>) -> Self {
        ToolOutput {
            data,
            message: message.into(),
            error: None,
        }
    }

    /// A failed outcome that still carries data.
    pub fn rejected(data: Value, message: impl Into<String>, code: &'static str) -> Self {
        ToolOutput {
            data,
            message: message.into(),
            error: Some(code),
        }
    }
}

/// Result type shared by every tool action.
pub type ToolResult = Result<ToolOutput, SnowError>;

/// `{success, data, message, action, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub data: Value,
    pub message: String,
    pub action: String,
    pub error: Option<String>,
}

impl ToolResponse {
    /// Wraps an action outcome, logging failures by kind.
    ///
    /// `secret` is scrubbed from error messages before they leave the
    /// process.
    pub fn from_result(action: &str, result: ToolResult, secret: &str) -> Self {
        match result {
            Ok(output) => ToolResponse {
                success: output.error.is_none(),
                data: output.data,
                message: output.message,
                action: action.to_string(),
                error: output.error.map(str::to_string),
            },
            Err(err) => {
                let message = err.sanitized_display(secret);
                match &err {
                    SnowError::Validation(_) => {
                        tracing::debug!(action = action, error = %message, "Validation failed");
                    }
                    SnowError::NotFound { .. } => {
                        tracing::warn!(action = action, error = %message, "Record not found");
                    }
                    SnowError::Serialization(_) => {
                        tracing::error!(action = action, error = %message, "Unexpected error");
                    }
                    _ => {
                        tracing::error!(action = action, error = %message, "ServiceNow error during action");
                    }
                }
                Self::failure(action, message, err.error_code())
            }
        }
    }

    pub fn failure(action: &str, message: impl Into<String>, code: &str) -> Self {
        ToolResponse {
            success: false,
            data: Value::Null,
            message: message.into(),
            action: action.to_string(),
            error: Some(code.to_string()),
        }
    }

    /// Response for every discovery tool when startup configuration failed.
    pub fn not_configured(action: &str, reason: &str) -> Self {
        Self::failure(
            action,
            format!("ServiceNow client not available: {}", reason),
            codes::CLIENT_NOT_CONFIGURED,
        )
    }

    /// Pretty-printed JSON for the MCP text content.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize tool response");
            format!(
                r#"{{"success": false, "data": null, "message": "Failed to serialize response", "action": "{}", "error": "{}"}}"#,
                self.action,
                codes::UNEXPECTED
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let response = ToolResponse::from_result(
            "get",
            Ok(ToolOutput::new(json!({"sys_id": "x"}), "Retrieved")),
            "",
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": true,
                "data": {"sys_id": "x"},
                "message": "Retrieved",
                "action": "get",
                "error": null,
            })
        );
    }

    #[test]
    fn test_error_envelope_uses_code_and_scrubs_secret() {
        let response = ToolResponse::from_result(
            "list",
            Err(SnowError::validation("bad input hunter2")),
            "hunter2",
        );
        assert!(!response.success);
        assert_eq!(response.data, Value::Null);
        assert_eq!(response.message, "bad input [REDACTED]");
        assert_eq!(response.error.as_deref(), Some("VALIDATION_ERROR"));
    }

    #[test]
    fn test_rejected_output_is_failure_with_data() {
        let response = ToolResponse::from_result(
            "validate",
            Ok(ToolOutput::rejected(json!({"issues": ["x"]}), "Validation failed: 1 issue(s)", codes::VALIDATION)),
            "",
        );
        assert!(!response.success);
        assert_eq!(response.data, json!({"issues": ["x"]}));
        assert_eq!(response.error.as_deref(), Some("VALIDATION_ERROR"));
    }

    #[test]
    fn test_not_configured() {
        let response = ToolResponse::not_configured("get", "Missing required environment variable: SNOW_INSTANCE");
        assert_eq!(
            response.message,
            "ServiceNow client not available: Missing required environment variable: SNOW_INSTANCE"
        );
        assert_eq!(response.error.as_deref(), Some("CLIENT_NOT_CONFIGURED"));
    }

    #[test]
    fn test_to_json_is_pretty() {
        let json = ToolResponse::failure("get", "nope", "NOT_FOUND").to_json();
        assert!(json.contains("\n  \"success\": false"));
    }
}
