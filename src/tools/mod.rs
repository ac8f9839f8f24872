//! MCP tool implementations for ServiceNow Discovery.
//!
//! Each submodule implements one tool as an async function taking the
//! shared [`SnowClient`], the sanitized input and the configured result
//! ceiling. Inputs are first converted into a typed request whose variants
//! carry exactly the parameters their action needs; validation happens
//! there, before any request is sent.

mod analysis;
mod compare;
mod credentials;
mod envelope;
mod health;
mod inputs;
mod patterns;
mod ranges;
mod remediation;
mod schedule;
mod schedules_list;
mod status;
pub mod validation;

pub use analysis::*;
pub use compare::*;
pub use credentials::*;
pub use envelope::*;
pub use health::*;
pub use inputs::*;
pub use patterns::*;
pub use ranges::*;
pub use remediation::*;
pub use schedule::*;
pub use schedules_list::*;
pub use status::*;

use serde::Serialize;
use serde_json::Value;

use crate::error::SnowError;
use crate::models::WireRecord;

/// Serializes a tool result payload.
fn to_data<T: Serialize + ?Sized>(value: &T) -> Result<Value, SnowError> {
    Ok(serde_json::to_value(value)?)
}

/// The record a create or update call returned; anything but an object
/// yields an empty row.
fn into_record(value: Value) -> WireRecord {
    match value {
        Value::Object(record) => record,
        _ => WireRecord::new(),
    }
}

/// Renders a boolean filter the way encoded queries expect it.
fn bool_condition(field: &str, value: bool) -> String {
    format!("{}={}", field, value)
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{json, Value};
    use wiremock::MockServer;

    use crate::snow_client::{ClientOptions, SnowClient};

    pub const SCAN_ID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    pub const SCAN_B_ID: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    pub const SCHEDULE_ID: &str = "cccccccccccccccccccccccccccccccc";
    pub const RECORD_ID: &str = "dddddddddddddddddddddddddddddddd";

    pub fn client_for(server: &MockServer) -> SnowClient {
        SnowClient::with_options(&server.uri(), "admin", "pw", ClientOptions::for_tests())
            .unwrap()
    }

    pub fn result(body: Value) -> Value {
        json!({ "result": body })
    }
}
