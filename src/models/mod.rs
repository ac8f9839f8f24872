//! Data models for ServiceNow Discovery tables.
//!
//! Every table-backed model implements [`FromWire`], which builds it from a
//! raw row with tolerant coercion. The analytics models are computed locally.

mod analytics;
mod common;
mod credential;
mod log;
mod pattern;
mod range;
mod schedule;
mod status;

pub use analytics::*;
pub use common::*;
pub use credential::*;
pub use log::*;
pub use pattern::*;
pub use range::*;
pub use schedule::*;
pub use status::*;
