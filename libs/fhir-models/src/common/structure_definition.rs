//! FHIR StructureDefinition model

use super::complex::PublicationStatus;
use super::element_definition::{Differential, Snapshot};
use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// FHIR StructureDefinition resource
///
/// Describes the shape of a resource, data type, or logical model. A
/// definition is "elaborated" once its `snapshot` is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    /// Resource type - always "StructureDefinition"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical identifier
    pub url: String,

    /// Business version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Name (computer friendly)
    pub name: String,

    /// Name (human friendly)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Publication status
    pub status: PublicationStatus,

    /// FHIR version this definition targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_version: Option<String>,

    /// primitive-type | complex-type | resource | logical
    pub kind: StructureDefinitionKind,

    /// Whether the structure is abstract
    #[serde(rename = "abstract")]
    pub is_abstract: bool,

    /// Type defined or constrained by this structure
    #[serde(rename = "type")]
    pub type_: String,

    /// Definition that this type is constrained/specialized from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,

    /// specialization | constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<TypeDerivationRule>,

    /// Snapshot view of the structure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,

    /// Differential view of the structure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential: Option<Differential>,

    /// Additional content
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

fn default_resource_type() -> String {
    "StructureDefinition".to_string()
}

/// Kind of structure a StructureDefinition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureDefinitionKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

/// How a type relates to its base definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDerivationRule {
    Specialization,
    Constraint,
}

impl StructureDefinition {
    /// Create a definition with minimal required fields
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        kind: StructureDefinitionKind,
        type_: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            url: url.into(),
            version: None,
            name: name.into(),
            title: None,
            status: PublicationStatus::Active,
            fhir_version: None,
            kind,
            is_abstract: false,
            type_: type_.into(),
            base_definition: None,
            derivation: None,
            snapshot: None,
            differential: None,
            extensions: Map::new(),
        }
    }

    /// Parse from JSON Value, checking the resourceType
    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("resourceType").and_then(Value::as_str) {
            Some("StructureDefinition") | None => Ok(serde_json::from_value(value)?),
            Some(other) => Err(Error::UnexpectedResourceType {
                expected: "StructureDefinition".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Whether the full element tree is present
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Whether this definition is a constraint (profile) on its base
    pub fn is_constraint(&self) -> bool {
        self.derivation == Some(TypeDerivationRule::Constraint)
    }

    /// Whether this definition specializes (introduces) a type
    pub fn is_specialization(&self) -> bool {
        self.derivation == Some(TypeDerivationRule::Specialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_profile_with_differential() {
        let sd = StructureDefinition::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/fhir/StructureDefinition/patient-profile",
            "name": "PatientProfile",
            "status": "draft",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
            "baseDefinition": "http://example.org/fhir/StructureDefinition/Patient",
            "derivation": "constraint",
            "differential": {
                "element": [{ "id": "Patient.name", "path": "Patient.name", "min": 1 }]
            },
            "text": { "status": "generated" }
        }))
        .unwrap();

        assert!(sd.is_constraint());
        assert!(!sd.has_snapshot());
        assert_eq!(sd.differential.as_ref().unwrap().element.len(), 1);
        assert!(sd.extensions.contains_key("text"));
    }

    #[test]
    fn rejects_other_resource_types() {
        let err = StructureDefinition::from_value(json!({ "resourceType": "ValueSet" }))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResourceType { .. }));
    }
}
