//! Version manifest of a context (`version.info`).
//!
//! ```text
//! [FHIR]
//! version=4.0.1
//! revision=9346c8cc45
//! date=20191101220000
//! ```

use crate::error::DefinitionError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionManifest {
    version: Option<String>,
    revision: Option<String>,
    date: Option<String>,
}

impl VersionManifest {
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Record a version: the first one sticks, later ones must match it.
    pub fn check_version(&mut self, incoming: &str) -> Result<(), DefinitionError> {
        match &self.version {
            None => {
                self.version = Some(incoming.to_string());
                Ok(())
            }
            Some(loaded) if loaded == incoming => Ok(()),
            Some(loaded) => Err(DefinitionError::VersionMismatch {
                loaded: loaded.clone(),
                incoming: incoming.to_string(),
            }),
        }
    }

    /// Overwrite the version without a consistency check
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Apply the `key=value` lines of a `version.info` file.
    ///
    /// Unknown lines are ignored. `revision` and `date` are last-write-wins.
    pub fn apply_version_info(&mut self, text: &str) -> Result<(), DefinitionError> {
        for line in text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
            if let Some(version) = line.strip_prefix("version=") {
                self.check_version(version)?;
            } else if let Some(revision) = line.strip_prefix("revision=") {
                self.revision = Some(revision.to_string());
            } else if let Some(date) = line.strip_prefix("date=") {
                self.date = Some(date.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = "[FHIR]\r\nversion=4.0.1\r\nrevision=9346c8cc45\r\ndate=20191101220000\r\n";

    #[test]
    fn parses_version_info() {
        let mut manifest = VersionManifest::default();
        manifest.apply_version_info(INFO).unwrap();

        assert_eq!(manifest.version(), Some("4.0.1"));
        assert_eq!(manifest.revision(), Some("9346c8cc45"));
        assert_eq!(manifest.date(), Some("20191101220000"));
    }

    #[test]
    fn identical_versions_are_accepted() {
        let mut manifest = VersionManifest::default();
        manifest.apply_version_info(INFO).unwrap();
        manifest.apply_version_info("version=4.0.1\ndate=20200101\n").unwrap();

        assert_eq!(manifest.date(), Some("20200101"));
    }

    #[test]
    fn different_version_is_a_mismatch() {
        let mut manifest = VersionManifest::default();
        manifest.apply_version_info("version=4.0.1").unwrap();

        let err = manifest.apply_version_info("version=4.0.0").unwrap_err();

        assert_eq!(
            err,
            DefinitionError::VersionMismatch {
                loaded: "4.0.1".to_string(),
                incoming: "4.0.0".to_string()
            }
        );
        assert_eq!(manifest.version(), Some("4.0.1"));
    }

    #[test]
    fn set_version_is_unconditional() {
        let mut manifest = VersionManifest::default();
        manifest.check_version("3.0.2").unwrap();
        manifest.set_version("4.0.1");
        assert_eq!(manifest.version(), Some("4.0.1"));
    }
}
