//! Configuration management for the snow-discovery MCP server.
//!
//! This module handles loading configuration from `SNOW_*` environment
//! variables, with validation to ensure all required values are present.

use std::env;
use std::fmt;

use url::Url;

use crate::error::SnowError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on records returned by a single list call.
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// Log levels accepted in `SNOW_LOG_LEVEL`.
const VALID_LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Configuration for connecting to a ServiceNow instance.
///
/// The password is stored but never logged; the `Debug` impl redacts it.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Instance URL without trailing slash (e.g., `https://dev12345.service-now.com`).
    pub instance: String,

    /// Basic-auth user name.
    pub username: String,

    /// Basic-auth password. Must never be logged or included in error messages.
    pub password: String,

    /// Request timeout in seconds.
    pub timeout: u64,

    /// Upper bound applied to every caller-supplied `limit`.
    pub max_results: u32,

    /// One of DEBUG, INFO, WARNING, ERROR, CRITICAL.
    pub log_level: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("instance", &self.instance)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("max_results", &self.max_results)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `SNOW_INSTANCE`: The `https://` URL of the instance
    /// - `SNOW_USERNAME`: The integration user
    /// - `SNOW_PASSWORD`: The integration user's password
    ///
    /// # Optional Environment Variables
    ///
    /// - `SNOW_TIMEOUT`: Request timeout in seconds (default 30)
    /// - `SNOW_MAX_RESULTS`: Maximum records per list call (default 100)
    /// - `SNOW_LOG_LEVEL`: DEBUG, INFO, WARNING, ERROR or CRITICAL (default INFO)
    ///
    /// # Errors
    ///
    /// Returns `SnowError::Config` if any required variable is missing
    /// or if values fail validation.
    pub fn from_env() -> Result<Self, SnowError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a closure over a map so the
    /// process environment is never touched.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SnowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let instance = Self::get_required(&lookup, "SNOW_INSTANCE")?;
        let username = Self::get_required(&lookup, "SNOW_USERNAME")?;
        let password = Self::get_required(&lookup, "SNOW_PASSWORD")?;

        let instance = Self::validate_instance(instance)?;

        let timeout = Self::parse_positive(&lookup, "SNOW_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        let max_results = Self::parse_positive(
            &lookup,
            "SNOW_MAX_RESULTS",
            u64::from(DEFAULT_MAX_RESULTS),
        )?;
        let max_results = u32::try_from(max_results)
            .map_err(|_| SnowError::invalid_config("SNOW_MAX_RESULTS is too large"))?;

        let log_level = Self::validate_log_level(lookup("SNOW_LOG_LEVEL"))?;

        Ok(Config {
            instance,
            username,
            password,
            timeout,
            max_results,
            log_level,
        })
    }

    /// Returns the host name of the instance, never the full URL.
    pub fn instance_hostname(&self) -> Option<String> {
        Url::parse(&self.instance)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Maps `log_level` onto a `tracing` filter directive.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }

    /// Gets a required variable, returning an error if missing or blank.
    fn get_required<F>(lookup: &F, name: &str) -> Result<String, SnowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SnowError::missing_env(name))
    }

    /// Parses an optional positive integer, falling back to `default`.
    fn parse_positive<F>(lookup: &F, name: &str, default: u64) -> Result<u64, SnowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
            return Ok(default);
        };
        match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(SnowError::invalid_config(format!(
                "{} must be a positive integer, got: {:?}",
                name, raw
            ))),
        }
    }

    /// Validates and normalizes the instance URL.
    fn validate_instance(url: String) -> Result<String, SnowError> {
        let url = url.trim().trim_end_matches('/').to_string();

        if !url.starts_with("https://") {
            return Err(SnowError::invalid_config(
                "SNOW_INSTANCE must start with https://",
            ));
        }

        let parsed = Url::parse(&url)
            .map_err(|e| SnowError::invalid_config(format!("SNOW_INSTANCE is not a valid URL: {}", e)))?;
        if parsed.host_str().is_none() {
            return Err(SnowError::invalid_config("SNOW_INSTANCE has no host"));
        }

        Ok(url)
    }

    /// Validates the log level, upper-casing it.
    fn validate_log_level(level: Option<String>) -> Result<String, SnowError> {
        let level = level
            .map(|l| l.trim().to_uppercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "INFO".to_string());

        if VALID_LOG_LEVELS.contains(&level.as_str()) {
            Ok(level)
        } else {
            Err(SnowError::invalid_config(format!(
                "SNOW_LOG_LEVEL must be one of {:?}, got: {:?}",
                VALID_LOG_LEVELS, level
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SNOW_INSTANCE", "https://dev12345.service-now.com/"),
        ("SNOW_USERNAME", "admin"),
        ("SNOW_PASSWORD", "s3cret"),
    ];

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.instance, "https://dev12345.service-now.com");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_results, 100);
        assert_eq!(config.log_level, "INFO");
    }

    #[test]
    fn test_from_lookup_optional_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SNOW_TIMEOUT", "60"));
        pairs.push(("SNOW_MAX_RESULTS", "250"));
        pairs.push(("SNOW_LOG_LEVEL", "debug"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.timeout, 60);
        assert_eq!(config.max_results, 250);
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.tracing_level(), "debug");
    }

    #[test]
    fn test_missing_password() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("SNOW_PASSWORD"));
    }

    #[test]
    fn test_blank_username_is_missing() {
        let pairs = [
            ("SNOW_INSTANCE", "https://dev.service-now.com"),
            ("SNOW_USERNAME", "   "),
            ("SNOW_PASSWORD", "x"),
        ];
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SNOW_USERNAME"));
    }

    #[test]
    fn test_instance_requires_https() {
        assert!(Config::validate_instance("http://dev.service-now.com".to_string()).is_err());
        assert!(Config::validate_instance("dev.service-now.com".to_string()).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SNOW_TIMEOUT", "0"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SNOW_TIMEOUT"));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SNOW_LOG_LEVEL", "TRACE"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_instance_hostname() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(
            config.instance_hostname().as_deref(),
            Some("dev12345.service-now.com")
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_tracing_level_mapping() {
        let mut config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        config.log_level = "WARNING".to_string();
        assert_eq!(config.tracing_level(), "warn");
        config.log_level = "CRITICAL".to_string();
        assert_eq!(config.tracing_level(), "error");
    }
}
