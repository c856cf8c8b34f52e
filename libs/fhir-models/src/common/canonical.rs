//! Generic canonical resource
//!
//! SearchParameter, OperationDefinition, Questionnaire, ConceptMap and
//! NamingSystem share the metadata a context needs to index them; their
//! bodies are kept as raw JSON.

use super::complex::PublicationStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header fields shared by canonical resources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResource {
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical identifier (NamingSystem has none in R4)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}
