//! Classification pattern model for the `cmdb_ci_pattern` table.

use serde::Serialize;

use super::common::{coerce_bool, coerce_string, FromWire, WireRecord};

/// A CI classification pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub sys_id: String,
    pub name: String,
    pub active: bool,
    /// Target CI class, e.g. `cmdb_ci_linux_server`.
    pub ci_type: String,
    pub criteria: String,
    pub description: String,
}

impl FromWire for Pattern {
    const TABLE: &'static str = "cmdb_ci_pattern";
    const FIELDS: &'static [&'static str] =
        &["sys_id", "name", "active", "ci_type", "criteria", "description"];

    fn from_wire(record: &WireRecord) -> Self {
        Pattern {
            sys_id: coerce_string(record.get("sys_id")),
            name: coerce_string(record.get("name")),
            active: coerce_bool(record.get("active"), true),
            ci_type: coerce_string(record.get("ci_type")),
            criteria: coerce_string(record.get("criteria")),
            description: coerce_string(record.get("description")),
        }
    }
}
