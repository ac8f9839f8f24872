//! Discovery schedule model for the `discovery_schedule` table.

use serde::Serialize;

use super::common::{coerce_bool, coerce_string, FromWire, WireRecord};

/// Discovery types a schedule can run.
pub const DISCOVER_TYPES: [&str; 5] = ["IP", "CI", "Network", "Cloud", "Configuration"];

/// Default maximum run time for new schedules.
pub const DEFAULT_MAX_RUN_TIME: &str = "02:00:00";

/// A recurring discovery schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub sys_id: String,
    pub name: String,
    pub active: bool,
    /// One of [`DISCOVER_TYPES`].
    pub discover: String,
    /// `HH:MM:SS`.
    pub max_run_time: String,
    pub run_dayofweek: String,
    pub run_time: String,
    pub mid_select_method: String,
    pub location: String,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            sys_id: String::new(),
            name: String::new(),
            active: true,
            discover: String::new(),
            max_run_time: DEFAULT_MAX_RUN_TIME.to_string(),
            run_dayofweek: String::new(),
            run_time: String::new(),
            mid_select_method: String::new(),
            location: String::new(),
        }
    }
}

impl FromWire for Schedule {
    const TABLE: &'static str = "discovery_schedule";
    const FIELDS: &'static [&'static str] = &[
        "sys_id",
        "name",
        "active",
        "discover",
        "max_run_time",
        "run_dayofweek",
        "run_time",
        "mid_select_method",
        "location",
    ];

    fn from_wire(record: &WireRecord) -> Self {
        let max_run_time = coerce_string(record.get("max_run_time"));
        Schedule {
            sys_id: coerce_string(record.get("sys_id")),
            name: coerce_string(record.get("name")),
            active: coerce_bool(record.get("active"), true),
            discover: coerce_string(record.get("discover")),
            max_run_time: if record.contains_key("max_run_time") {
                max_run_time
            } else {
                DEFAULT_MAX_RUN_TIME.to_string()
            },
            run_dayofweek: coerce_string(record.get("run_dayofweek")),
            run_time: coerce_string(record.get("run_time")),
            mid_select_method: coerce_string(record.get("mid_select_method")),
            location: coerce_string(record.get("location")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_when_absent() {
        let schedule = Schedule::from_wire(&WireRecord::new());
        assert!(schedule.active);
        assert_eq!(schedule.max_run_time, "02:00:00");
    }

    #[test]
    fn test_active_false_string() {
        let record = json!({"name": "Weekly", "active": "false", "discover": "IP"});
        let schedule = Schedule::from_wire(record.as_object().unwrap());
        assert!(!schedule.active);
        assert_eq!(schedule.discover, "IP");
    }
}
