//! FHIR StructureMap model
//!
//! Only the header and the `structure` declarations are modelled; groups and
//! rules are carried opaquely in `extensions`.

use super::complex::PublicationStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// FHIR StructureMap resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructureMap {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical identifier
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub name: String,

    pub status: PublicationStatus,

    /// Structure definitions used by this map
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<StructureMapStructure>,

    /// Other maps used by this map
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import: Vec<String>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

fn default_resource_type() -> String {
    "StructureMap".to_string()
}

/// A model declaration of a StructureMap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureMapStructure {
    /// Canonical reference to the structure definition
    pub url: String,

    /// How the model is used by the map
    pub mode: StructureMapModelMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// source | queried | target | produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureMapModelMode {
    Source,
    Queried,
    Target,
    Produced,
}

impl StructureMap {
    /// Source-mode structure declarations
    pub fn sources(&self) -> impl Iterator<Item = &StructureMapStructure> + '_ {
        self.structure
            .iter()
            .filter(|s| s.mode == StructureMapModelMode::Source)
    }
}
