//! Context configuration

use crate::snapshot::MaterializerPolicy;
use serde::{Deserialize, Serialize};

/// Behaviour switches of a [`WorkerContext`](crate::WorkerContext).
///
/// Deserializes from any serde source with missing fields defaulted, e.g.
/// `ignore_profile_errors = true` in TOML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Accept snapshots whose generation raised Error messages (never Fatal ones)
    pub ignore_profile_errors: bool,
    /// Let a later resource replace an earlier one with the same canonical URL
    pub allow_loading_duplicates: bool,
}

impl ContextConfig {
    pub fn policy(&self) -> MaterializerPolicy {
        MaterializerPolicy {
            ignore_profile_errors: self.ignore_profile_errors,
        }
    }
}
