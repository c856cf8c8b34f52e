//! FHIR worker context
//!
//! Holds the definitional resources of one FHIR version (StructureDefinitions,
//! ValueSets, CodeSystems, StructureMaps and friends) loaded from zip packs,
//! NPM packages, bundles or plain files, and hands them out to validators,
//! mappers and code generators.
//!
//! Profiles are usually distributed with a differential only. Their snapshot
//! is generated the first time they are fetched, after their base, and the
//! outcome is kept for every later caller.
//!
//! ```rust,no_run
//! use hearth_context::{ContextConfig, WorkerContext};
//! use std::path::Path;
//!
//! # fn main() -> hearth_context::Result<()> {
//! let context = WorkerContext::from_pack(
//!     Path::new("definitions.xml.zip"),
//!     ContextConfig::default(),
//! )?;
//! if let Some(sd) = context.get_structure_definition("http://hl7.org/fhir/StructureDefinition/Patient") {
//!     println!("{} has {} elements", sd.name, sd.snapshot.as_ref().map_or(0, |s| s.element.len()));
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod resource;
pub mod snapshot;
pub mod transform;

pub use cache::{CacheEntry, DefinitionCache};
pub use config::ContextConfig;
pub use context::{WorkerContext, CORE_STRUCTURE_PREFIX};
pub use error::{DefinitionError, Error, Result};
pub use loader::{PackageSource, ResourceDecoder, StandardDecoder, VERSION_INFO};
pub use manifest::VersionManifest;
pub use resource::{CachedResource, Resource, ResourceKind};
pub use snapshot::MaterializerPolicy;

pub use hearth_snapshot::{
    DifferentialMerger, IssueSeverity, SnapshotGenerator, SnapshotOutcome, ValidationMessage,
};
