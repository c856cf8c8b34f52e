//! FHIR StructureDefinition snapshot generation
//!
//! A profile states only how it differs from its base (the differential).
//! This crate computes the full element list (the snapshot) by merging the
//! differential over the base snapshot.
//!
//! # Example
//!
//! ```rust,no_run
//! use hearth_models::StructureDefinition;
//! use hearth_snapshot::generate_snapshot;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let base: StructureDefinition = unimplemented!();
//! # let profile: StructureDefinition = unimplemented!();
//! let snapshot = generate_snapshot(&base, &profile)?;
//! println!("{} elements", snapshot.element.len());
//! # Ok(())
//! # }
//! ```
//!
//! Worker contexts use the [`SnapshotGenerator`] trait instead, which
//! returns every message and leaves the accept/reject decision to the caller.

pub mod error;
pub mod generator;
pub mod merge;
pub mod normalization;
pub mod ordering;

pub use error::{Error, Result};
pub use generator::{IssueSeverity, SnapshotGenerator, SnapshotOutcome, ValidationMessage};
pub use hearth_models::{Differential, ElementDefinition, ElementDefinitionType, Snapshot};
pub use merge::DifferentialMerger;

use hearth_models::StructureDefinition;

/// Generate the snapshot of `derived` from its elaborated `base`.
///
/// Fails on the first differential ordering problem, or on the first
/// message of error severity or worse.
pub fn generate_snapshot(
    base: &StructureDefinition,
    derived: &StructureDefinition,
) -> Result<Snapshot> {
    let merger = DifferentialMerger::new();
    let mut derived = derived.clone();

    if let Some(problem) = merger.sort_differential(base, &mut derived).into_iter().next() {
        return Err(Error::Differential(problem));
    }

    let outcome = merger.generate(base, &derived);
    if let Some(message) = outcome.worst_message() {
        if message.severity >= IssueSeverity::Error {
            return Err(Error::Snapshot(message.to_string()));
        }
    }

    outcome
        .snapshot
        .ok_or_else(|| Error::Snapshot(format!("No snapshot generated for {}", derived.url)))
}
