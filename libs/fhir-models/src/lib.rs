//! FHIR conformance resource models
//!
//! This crate provides strongly-typed Rust structures for the definitional
//! resources a worker context caches: StructureDefinitions (with their
//! snapshot and differential element lists), StructureMaps, ValueSets,
//! CodeSystems, Bundles, and a generic canonical resource shape for the
//! remaining kinds.
//!
//! # Design
//!
//! - **Version-agnostic core**: fields common to R4, R4B and R5
//! - **Lossless**: every model keeps unknown properties in an `extensions` map
//! - **Serde-first**: models deserialize directly from FHIR JSON values
//!
//! # Example
//!
//! ```rust
//! use hearth_models::{StructureDefinition, StructureDefinitionKind};
//! use serde_json::json;
//!
//! let sd: StructureDefinition = serde_json::from_value(json!({
//!     "resourceType": "StructureDefinition",
//!     "url": "http://hl7.org/fhir/StructureDefinition/Patient",
//!     "name": "Patient",
//!     "status": "active",
//!     "kind": "resource",
//!     "abstract": false,
//!     "type": "Patient"
//! }))
//! .unwrap();
//!
//! assert_eq!(sd.name, "Patient");
//! assert_eq!(sd.kind, StructureDefinitionKind::Resource);
//! assert!(!sd.has_snapshot());
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
