//! Error types for FHIR context

use crate::resource::ResourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An entry could not be decoded; no entry of the same load was kept.
    #[error("Error parsing {name}: {message}")]
    Format { name: String, message: String },

    #[error("Duplicate Resource {identity} ({kind})")]
    DuplicateResource { kind: ResourceKind, identity: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Package error: {0}")]
    Package(#[from] hearth_package::PackageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with definitional content: elaboration failures and manifest
/// version conflicts.
///
/// Elaboration failures are memoized per definition, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Profile {name} ({url}) has no base and no snapshot")]
    NoBase { name: String, url: String },

    #[error("Profile {name} ({url}) base {base} could not be resolved")]
    BaseUnresolved {
        name: String,
        url: String,
        base: String,
    },

    #[error("Profile {name} ({url}) base {base} could not be elaborated: {cause}")]
    BaseFailed {
        name: String,
        url: String,
        base: String,
        cause: Box<DefinitionError>,
    },

    #[error("Profile {name} ({url}) has a circular base chain: {}", .chain.join(" -> "))]
    CircularBase {
        name: String,
        url: String,
        chain: Vec<String>,
    },

    #[error("Profile {name} ({url}). Error sorting Differential: {message}")]
    DifferentialSort {
        name: String,
        url: String,
        message: String,
    },

    #[error("Profile {name} ({url}). Error generating snapshot: {message}")]
    Merge {
        name: String,
        url: String,
        message: String,
    },

    #[error("Profile {name} ({url}). Error generating snapshot: no snapshot was produced")]
    EmptySnapshot { name: String, url: String },

    #[error("Version mismatch. The context has version {loaded} loaded, and the new content being loaded is version {incoming}")]
    VersionMismatch { loaded: String, incoming: String },
}

impl DefinitionError {
    /// Canonical URL of the definition the error is about, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            DefinitionError::NoBase { url, .. }
            | DefinitionError::BaseUnresolved { url, .. }
            | DefinitionError::BaseFailed { url, .. }
            | DefinitionError::CircularBase { url, .. }
            | DefinitionError::DifferentialSort { url, .. }
            | DefinitionError::Merge { url, .. }
            | DefinitionError::EmptySnapshot { url, .. } => Some(url),
            DefinitionError::VersionMismatch { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
