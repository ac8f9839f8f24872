//! Scan status model for the `discovery_status` table.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::{coerce_datetime, coerce_int, coerce_string, duration_seconds, FromWire, WireRecord};

/// Scan states reported by the instance.
pub const SCAN_STATES: [&str; 5] = ["Starting", "Active", "Completed", "Cancelled", "Error"];

/// One discovery scan run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStatus {
    /// Record identifier.
    pub sys_id: String,
    /// Display name of the scan.
    pub name: String,
    /// One of [`SCAN_STATES`], kept verbatim.
    pub state: String,
    /// The schedule that launched the scan.
    pub source: String,
    /// Classification status text.
    pub dscl_status: String,
    /// Log summary text.
    pub log: String,
    /// When the scan started.
    pub started: Option<DateTime<Utc>>,
    /// When the scan finished.
    pub completed: Option<DateTime<Utc>>,
    /// Configuration items discovered.
    pub ci_count: i64,
    /// Target IP address.
    pub ip_address: String,
    /// MID server that ran the scan.
    pub mid_server: String,
}

impl ScanStatus {
    /// True once the scan reached a terminal state.
    pub fn is_complete(&self) -> bool {
        matches!(self.state.as_str(), "Completed" | "Cancelled" | "Error")
    }

    /// Run time in seconds, when both timestamps are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        duration_seconds(self.started, self.completed)
    }
}

impl FromWire for ScanStatus {
    const TABLE: &'static str = "discovery_status";
    const FIELDS: &'static [&'static str] = &[
        "sys_id",
        "name",
        "state",
        "source",
        "dscl_status",
        "log",
        "started",
        "completed",
        "ci_count",
        "ip_address",
        "mid_server",
    ];

    fn from_wire(record: &WireRecord) -> Self {
        ScanStatus {
            sys_id: coerce_string(record.get("sys_id")),
            name: coerce_string(record.get("name")),
            state: coerce_string(record.get("state")),
            source: coerce_string(record.get("source")),
            dscl_status: coerce_string(record.get("dscl_status")),
            log: coerce_string(record.get("log")),
            started: coerce_datetime(record.get("started")),
            completed: coerce_datetime(record.get("completed")),
            ci_count: coerce_int(record.get("ci_count"), 0),
            ip_address: coerce_string(record.get("ip_address")),
            mid_server: coerce_string(record.get("mid_server")),
        }
    }
}
