//! Log entry model for the `discovery_log` table.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::{coerce_datetime, coerce_string, FromWire, WireRecord};

/// Log levels written by discovery.
pub const LOG_LEVELS: [&str; 3] = ["Info", "Warning", "Error"];

/// One log line emitted during a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogEntry {
    pub sys_id: String,
    /// sys_id of the owning `discovery_status` row.
    pub status: String,
    pub level: String,
    pub message: String,
    pub source: String,
    pub created_on: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Case-insensitive level check.
    pub fn has_level(&self, level: &str) -> bool {
        self.level.eq_ignore_ascii_case(level)
    }
}

impl FromWire for LogEntry {
    const TABLE: &'static str = "discovery_log";
    const FIELDS: &'static [&'static str] =
        &["sys_id", "status", "level", "message", "source", "created_on"];

    fn from_wire(record: &WireRecord) -> Self {
        LogEntry {
            sys_id: coerce_string(record.get("sys_id")),
            status: coerce_string(record.get("status")),
            level: coerce_string(record.get("level")),
            message: coerce_string(record.get("message")),
            source: coerce_string(record.get("source")),
            created_on: coerce_datetime(record.get("created_on")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_level_ignores_case() {
        let entry = LogEntry::from_wire(json!({"level": "ERROR"}).as_object().unwrap());
        assert!(entry.has_level("Error"));
        assert!(!entry.has_level("Warning"));
    }
}
