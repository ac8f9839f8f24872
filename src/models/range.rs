//! IP range model for the `discovery_range` table.

use serde::Serialize;

use super::common::{coerce_bool, coerce_string, field, FieldMap, FromWire, WireRecord};

/// Range types and how `range_start`/`range_end` are read:
/// `IP Range` spans two addresses, `IP Network` holds a CIDR in
/// `range_start`, `IP Address` holds a single address.
pub const RANGE_TYPES: [&str; 3] = ["IP Range", "IP Network", "IP Address"];

/// An address range included in or excluded from discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Range {
    pub sys_id: String,
    pub name: String,
    /// One of [`RANGE_TYPES`].
    #[serde(rename = "type")]
    pub range_type: String,
    pub active: bool,
    pub range_start: String,
    pub range_end: String,
    /// False marks an exclusion range.
    pub include: bool,
}

impl Default for Range {
    fn default() -> Self {
        Range {
            sys_id: String::new(),
            name: String::new(),
            range_type: String::new(),
            active: true,
            range_start: String::new(),
            range_end: String::new(),
            include: true,
        }
    }
}

impl FromWire for Range {
    const TABLE: &'static str = "discovery_range";
    const FIELDS: &'static [&'static str] = &[
        "sys_id",
        "name",
        "type",
        "active",
        "range_start",
        "range_end",
        "include",
    ];
    const FIELD_MAP: FieldMap = &[("type", "range_type")];

    fn from_wire(record: &WireRecord) -> Self {
        Range {
            sys_id: coerce_string(record.get("sys_id")),
            name: coerce_string(record.get("name")),
            range_type: coerce_string(field(record, Self::FIELD_MAP, "range_type")),
            active: coerce_bool(record.get("active"), true),
            range_start: coerce_string(record.get("range_start")),
            range_end: coerce_string(record.get("range_end")),
            include: coerce_bool(record.get("include"), true),
        }
    }
}
