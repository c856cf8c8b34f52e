//! Cached resource kinds and payloads.

use hearth_models::{
    CanonicalResource, CodeSystem, StructureDefinition, StructureMap, ValueSet,
};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kinds of resource a worker context keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    StructureDefinition,
    ValueSet,
    CodeSystem,
    SearchParameter,
    OperationDefinition,
    Questionnaire,
    ConceptMap,
    StructureMap,
    NamingSystem,
    /// Raw bytes kept by entry name
    Binary,
}

impl ResourceKind {
    /// The nine kinds loaded from packages by default
    pub const DEFINITIONAL: [ResourceKind; 9] = [
        ResourceKind::StructureDefinition,
        ResourceKind::ValueSet,
        ResourceKind::CodeSystem,
        ResourceKind::SearchParameter,
        ResourceKind::OperationDefinition,
        ResourceKind::Questionnaire,
        ResourceKind::ConceptMap,
        ResourceKind::StructureMap,
        ResourceKind::NamingSystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StructureDefinition => "StructureDefinition",
            ResourceKind::ValueSet => "ValueSet",
            ResourceKind::CodeSystem => "CodeSystem",
            ResourceKind::SearchParameter => "SearchParameter",
            ResourceKind::OperationDefinition => "OperationDefinition",
            ResourceKind::Questionnaire => "Questionnaire",
            ResourceKind::ConceptMap => "ConceptMap",
            ResourceKind::StructureMap => "StructureMap",
            ResourceKind::NamingSystem => "NamingSystem",
            ResourceKind::Binary => "Binary",
        }
    }

    /// Kind for a definitional `resourceType`; `Binary` is never matched
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::DEFINITIONAL
            .into_iter()
            .find(|kind| kind.as_str() == resource_type)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Binary" => Ok(ResourceKind::Binary),
            other => Self::from_resource_type(other)
                .ok_or_else(|| format!("Unknown resource kind: {}", other)),
        }
    }
}

/// Typed payload of a cached resource
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    StructureDefinition(Arc<StructureDefinition>),
    ValueSet(Arc<ValueSet>),
    CodeSystem(Arc<CodeSystem>),
    SearchParameter(Arc<CanonicalResource>),
    OperationDefinition(Arc<CanonicalResource>),
    Questionnaire(Arc<CanonicalResource>),
    ConceptMap(Arc<CanonicalResource>),
    StructureMap(Arc<StructureMap>),
    NamingSystem(Arc<CanonicalResource>),
    Binary(Arc<Vec<u8>>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::StructureDefinition(_) => ResourceKind::StructureDefinition,
            Resource::ValueSet(_) => ResourceKind::ValueSet,
            Resource::CodeSystem(_) => ResourceKind::CodeSystem,
            Resource::SearchParameter(_) => ResourceKind::SearchParameter,
            Resource::OperationDefinition(_) => ResourceKind::OperationDefinition,
            Resource::Questionnaire(_) => ResourceKind::Questionnaire,
            Resource::ConceptMap(_) => ResourceKind::ConceptMap,
            Resource::StructureMap(_) => ResourceKind::StructureMap,
            Resource::NamingSystem(_) => ResourceKind::NamingSystem,
            Resource::Binary(_) => ResourceKind::Binary,
        }
    }

    pub fn canonical_url(&self) -> Option<&str> {
        match self {
            Resource::StructureDefinition(sd) => Some(sd.url.as_str()),
            Resource::ValueSet(vs) => vs.url.as_deref(),
            Resource::CodeSystem(cs) => cs.url.as_deref(),
            Resource::StructureMap(map) => Some(map.url.as_str()),
            Resource::SearchParameter(r)
            | Resource::OperationDefinition(r)
            | Resource::Questionnaire(r)
            | Resource::ConceptMap(r)
            | Resource::NamingSystem(r) => r.url.as_deref(),
            Resource::Binary(_) => None,
        }
        .filter(|url| !url.is_empty())
    }

    /// Build the typed payload for a decoded resource.
    ///
    /// Returns `Ok(None)` for resource types a worker context does not keep.
    pub fn from_value(value: Value) -> hearth_models::Result<Option<Self>> {
        let Some(kind) = hearth_models::resource_type_of(&value)
            .and_then(ResourceKind::from_resource_type)
        else {
            return Ok(None);
        };

        let resource = match kind {
            ResourceKind::StructureDefinition => {
                Resource::StructureDefinition(Arc::new(StructureDefinition::from_value(value)?))
            }
            ResourceKind::ValueSet => Resource::ValueSet(Arc::new(serde_json::from_value(value)?)),
            ResourceKind::CodeSystem => {
                Resource::CodeSystem(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::StructureMap => {
                Resource::StructureMap(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::SearchParameter => {
                Resource::SearchParameter(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::OperationDefinition => {
                Resource::OperationDefinition(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::Questionnaire => {
                Resource::Questionnaire(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::ConceptMap => {
                Resource::ConceptMap(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::NamingSystem => {
                Resource::NamingSystem(Arc::new(serde_json::from_value(value)?))
            }
            ResourceKind::Binary => return Ok(None),
        };

        Ok(Some(resource))
    }
}

/// A resource as held by the definition cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResource {
    pub canonical_url: Option<String>,
    /// Archive entry name or bundle-derived name
    pub identity_name: String,
    pub content: Resource,
}

impl CachedResource {
    pub fn new(identity_name: impl Into<String>, content: Resource) -> Self {
        Self {
            canonical_url: content.canonical_url().map(str::to_string),
            identity_name: identity_name.into(),
            content,
        }
    }

    pub fn binary(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, Resource::Binary(Arc::new(bytes)))
    }

    pub fn kind(&self) -> ResourceKind {
        self.content.kind()
    }

    /// The cache key identity: canonical URL when present, else the name
    pub fn identity(&self) -> &str {
        self.canonical_url.as_deref().unwrap_or(&self.identity_name)
    }
}
