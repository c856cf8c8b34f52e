//! Small shared datatypes

use serde::{Deserialize, Serialize};

/// Publication status of a conformance resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Active,
    Retired,
    Unknown,
}

/// Returns the `resourceType` of a raw JSON resource, if any.
pub fn resource_type_of(value: &serde_json::Value) -> Option<&str> {
    value.get("resourceType").and_then(serde_json::Value::as_str)
}
