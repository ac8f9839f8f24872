//! Credential metadata for the `discovery_credential` table.
//!
//! Only non-secret columns exist on [`Credential`]. Raw rows additionally
//! pass through [`strip_secrets`] before they are returned anywhere, so a
//! secret column can never leak even when a caller asks for raw data.

use serde::Serialize;

use super::common::{coerce_bool, coerce_int, coerce_string, field, FieldMap, FromWire, WireRecord};

/// Columns that are always safe to return.
pub const SAFE_FIELDS: [&str; 7] = ["sys_id", "name", "type", "active", "tag", "order", "affinity"];

/// Substrings that mark a column as secret-bearing.
pub const SECRET_MARKERS: [&str; 12] = [
    "password",
    "secret",
    "private_key",
    "ssh_private",
    "community",
    "passphrase",
    "token",
    "credential",
    "auth_key",
    "key_file",
    "pem",
    "cert_body",
];

/// Discovery credential metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    pub sys_id: String,
    pub name: String,
    /// SSH, SNMP, Windows, VMware and so on.
    #[serde(rename = "type")]
    pub credential_type: String,
    pub active: bool,
    pub tag: String,
    /// Lower values are tried first.
    pub order: i64,
    pub affinity: String,
}

impl Default for Credential {
    fn default() -> Self {
        Credential {
            sys_id: String::new(),
            name: String::new(),
            credential_type: String::new(),
            active: true,
            tag: String::new(),
            order: 100,
            affinity: String::new(),
        }
    }
}

impl FromWire for Credential {
    const TABLE: &'static str = "discovery_credential";
    const FIELDS: &'static [&'static str] = &SAFE_FIELDS;
    const FIELD_MAP: FieldMap = &[("type", "credential_type")];

    fn from_wire(record: &WireRecord) -> Self {
        Credential {
            sys_id: coerce_string(record.get("sys_id")),
            name: coerce_string(record.get("name")),
            credential_type: coerce_string(field(record, Self::FIELD_MAP, "credential_type")),
            active: coerce_bool(record.get("active"), true),
            tag: coerce_string(record.get("tag")),
            order: coerce_int(record.get("order"), 100),
            affinity: coerce_string(record.get("affinity")),
        }
    }
}

/// Returns true when a column name looks secret-bearing.
pub fn is_secret_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SECRET_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Drops every secret-bearing column from a raw credential row.
///
/// Allow-listed columns are always kept; anything else is kept only when it
/// matches none of the [`SECRET_MARKERS`].
pub fn strip_secrets(record: &WireRecord) -> WireRecord {
    record
        .iter()
        .filter(|(key, _)| SAFE_FIELDS.contains(&key.as_str()) || !is_secret_field(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
