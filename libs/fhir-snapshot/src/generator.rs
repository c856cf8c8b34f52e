//! The snapshot generator seam.
//!
//! A worker context elaborates profiles through [`SnapshotGenerator`] and
//! decides from the returned messages whether the result is usable.

use hearth_models::{Snapshot, StructureDefinition};
use std::fmt;

/// Severity of a message raised while generating a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueSeverity {
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Information => "information",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
            IssueSeverity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// A message about one element (or the whole definition) of a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub severity: IssueSeverity,
    /// Element id or path the message is about
    pub path: String,
    pub text: String,
}

impl ValidationMessage {
    pub fn new(severity: IssueSeverity, path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn information(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Information, path, text)
    }

    pub fn warning(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, path, text)
    }

    pub fn error(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, path, text)
    }

    pub fn fatal(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Fatal, path, text)
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{}: {}", self.path, self.text)
        }
    }
}

/// Result of one `generate` call.
///
/// A snapshot may be present even when error messages were raised; the
/// caller decides whether to keep it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotOutcome {
    pub snapshot: Option<Snapshot>,
    pub messages: Vec<ValidationMessage>,
}

impl SnapshotOutcome {
    /// Highest severity among the messages
    pub fn worst(&self) -> Option<IssueSeverity> {
        self.messages.iter().map(|m| m.severity).max()
    }

    /// First message carrying the highest severity
    pub fn worst_message(&self) -> Option<&ValidationMessage> {
        let worst = self.worst()?;
        self.messages.iter().find(|m| m.severity == worst)
    }
}

/// Builds the snapshot of a derived definition from its base.
///
/// `base` is always already elaborated when called from a worker context.
pub trait SnapshotGenerator: Send + Sync {
    /// Put the differential of `derived` into base order.
    ///
    /// Returns one string per problem found; an empty list means success.
    fn sort_differential(
        &self,
        _base: &StructureDefinition,
        _derived: &mut StructureDefinition,
    ) -> Vec<String> {
        Vec::new()
    }

    fn generate(&self, base: &StructureDefinition, derived: &StructureDefinition)
        -> SnapshotOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_order_from_information_to_fatal() {
        assert!(IssueSeverity::Information < IssueSeverity::Warning);
        assert!(IssueSeverity::Warning < IssueSeverity::Error);
        assert!(IssueSeverity::Error < IssueSeverity::Fatal);
    }

    #[test]
    fn worst_message_is_the_first_of_the_highest_severity() {
        let outcome = SnapshotOutcome {
            snapshot: None,
            messages: vec![
                ValidationMessage::warning("Patient", "w"),
                ValidationMessage::error("Patient.name", "first"),
                ValidationMessage::error("Patient.gender", "second"),
            ],
        };

        assert_eq!(outcome.worst(), Some(IssueSeverity::Error));
        assert_eq!(outcome.worst_message().unwrap().text, "first");
        assert_eq!(
            outcome.worst_message().unwrap().to_string(),
            "Patient.name: first"
        );
    }
}
