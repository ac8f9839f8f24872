//! Common helpers shared across ServiceNow table models.
//!
//! ServiceNow returns nearly every column as a string: booleans arrive as
//! `"true"`/`"false"`, integers as `"42"`, and datetimes as
//! `"YYYY-MM-DD HH:MM:SS"` in UTC. The coercions here turn those into typed
//! values without ever failing; anything unusable falls back to the field's
//! default.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// A raw table row as returned inside the `result` envelope.
pub type WireRecord = Map<String, Value>;

/// The datetime format used by the ServiceNow REST API.
pub const SNOW_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pairs of `(wire name, domain name)` for columns whose names differ.
pub type FieldMap = &'static [(&'static str, &'static str)];

/// A typed projection of one ServiceNow table row.
pub trait FromWire: Sized {
    /// The table this model is read from.
    const TABLE: &'static str;

    /// The columns requested through `sysparm_fields`.
    const FIELDS: &'static [&'static str];

    /// Wire-name to domain-name renames. Empty for most tables.
    const FIELD_MAP: FieldMap = &[];

    /// Builds the model from a raw row. Never fails; missing or malformed
    /// columns keep their defaults.
    fn from_wire(record: &WireRecord) -> Self;

    /// Converts every row of a result set.
    fn from_wire_all(records: &[WireRecord]) -> Vec<Self> {
        records.iter().map(Self::from_wire).collect()
    }
}

/// Looks up a field by its domain name.
///
/// When `domain` has a wire rename the wire key wins, and the domain key is
/// the fallback for callers that already speak domain names.
pub fn field<'a>(record: &'a WireRecord, field_map: FieldMap, domain: &str) -> Option<&'a Value> {
    let wire = field_map
        .iter()
        .find(|(_, d)| *d == domain)
        .map(|(w, _)| *w);
    match wire {
        Some(wire) => record.get(wire).or_else(|| record.get(domain)),
        None => record.get(domain),
    }
}

/// Coerces a ServiceNow boolean-ish value.
///
/// Accepts native booleans, numbers (non-zero is true) and the strings
/// `"true"`, `"1"` and `"yes"` in any case. Other strings are false; null or
/// absent values return `default`.
pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => default,
    }
}

/// Coerces a ServiceNow integer-ish value, falling back to `default`.
pub fn coerce_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Coerces a value to a trimmed string. Null and absent become `""`.
///
/// Reference columns fetched without `sysparm_display_value` arrive as
/// `{"link": ..., "value": ...}`; the `value` member is used.
pub fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Object(obj)) => coerce_string(obj.get("value")),
        _ => String::new(),
    }
}

/// Coerces a value to a UTC timestamp, or `None` when absent or unparsable.
pub fn coerce_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value {
        Some(Value::String(s)) => parse_snow_datetime(s),
        _ => None,
    }
}

/// Parses a ServiceNow datetime string.
///
/// The native `"YYYY-MM-DD HH:MM:SS"` form is tried first, then ISO 8601
/// with a `T` separator (with or without offset). Empty or invalid input
/// yields `None`, never an error.
pub fn parse_snow_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, SNOW_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Renders a ServiceNow datetime string as ISO 8601 with a trailing `Z`.
pub fn format_snow_datetime(value: &str) -> Option<String> {
    parse_snow_datetime(value).map(|dt| format!("{}Z", dt.naive_utc().format("%Y-%m-%dT%H:%M:%S")))
}

/// Seconds between two optional timestamps, when both are present.
pub fn duration_seconds(
    started: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
) -> Option<f64> {
    match (started, completed) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
        _ => None,
    }
}

/// Renders a boolean the way ServiceNow expects it in a request body.
pub fn snow_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_coerce_bool_strings() {
        for truthy in ["true", "TRUE", "1", "yes", "Yes"] {
            assert!(coerce_bool(Some(&json!(truthy)), false), "{}", truthy);
        }
        for falsy in ["false", "0", "no", "", "maybe"] {
            assert!(!coerce_bool(Some(&json!(falsy)), true), "{}", falsy);
        }
    }

    #[test]
    fn test_coerce_bool_native_and_missing() {
        assert!(coerce_bool(Some(&json!(true)), false));
        assert!(!coerce_bool(Some(&json!(0)), true));
        assert!(coerce_bool(Some(&json!(2)), false));
        assert!(coerce_bool(None, true));
        assert!(!coerce_bool(Some(&Value::Null), false));
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int(Some(&json!(42)), 0), 42);
        assert_eq!(coerce_int(Some(&json!(" 17 ")), 0), 17);
        assert_eq!(coerce_int(Some(&json!("")), 100), 100);
        assert_eq!(coerce_int(Some(&json!("abc")), 100), 100);
        assert_eq!(coerce_int(None, 7), 7);
    }

    #[test]
    fn test_coerce_string_reference_value() {
        let reference = json!({"link": "https://x/api/now/table/t/1", "value": "abc"});
        assert_eq!(coerce_string(Some(&reference)), "abc");
        assert_eq!(coerce_string(Some(&json!("  padded "))), "padded");
        assert_eq!(coerce_string(None), "");
    }

    #[test]
    fn test_parse_snow_datetime_native_format() {
        let dt = parse_snow_datetime("2024-01-15 10:30:45").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.second(), 45);
    }

    #[test]
    fn test_parse_snow_datetime_iso_fallback() {
        assert!(parse_snow_datetime("2024-01-15T10:30:45").is_some());
        assert!(parse_snow_datetime("2024-01-15T10:30:45Z").is_some());
        assert!(parse_snow_datetime("2024-01-15T10:30:45+02:00").is_some());
    }

    #[test]
    fn test_parse_snow_datetime_invalid_is_none() {
        assert!(parse_snow_datetime("").is_none());
        assert!(parse_snow_datetime("   ").is_none());
        assert!(parse_snow_datetime("not a date").is_none());
    }

    #[test]
    fn test_format_snow_datetime() {
        assert_eq!(
            format_snow_datetime("2024-01-15 10:30:00").as_deref(),
            Some("2024-01-15T10:30:00Z")
        );
        assert_eq!(format_snow_datetime("garbage"), None);
    }

    #[test]
    fn test_field_prefers_wire_name() {
        const MAP: FieldMap = &[("type", "credential_type")];
        let record = json!({"type": "SSH", "credential_type": "SNMP"});
        let record = record.as_object().unwrap();
        assert_eq!(field(record, MAP, "credential_type"), Some(&json!("SSH")));

        let fallback = json!({"credential_type": "SNMP"});
        let fallback = fallback.as_object().unwrap();
        assert_eq!(field(fallback, MAP, "credential_type"), Some(&json!("SNMP")));
    }

    #[test]
    fn test_duration_seconds() {
        let start = parse_snow_datetime("2024-01-15 10:00:00");
        let end = parse_snow_datetime("2024-01-15 10:05:30");
        assert_eq!(duration_seconds(start, end), Some(330.0));
        assert_eq!(duration_seconds(start, None), None);
    }
}
