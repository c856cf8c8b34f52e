//! CLI settings
//!
//! Read from an optional TOML file, then from `HEARTH_*` environment
//! variables (`HEARTH_IGNORE_PROFILE_ERRORS=true`, `HEARTH_LOG_LEVEL=debug`).
//! Command-line flags are applied on top by the caller.

use anyhow::Context;
use config::{Config, Environment, File};
use hearth_context::ContextConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub ignore_profile_errors: bool,
    pub allow_loading_duplicates: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ignore_profile_errors: false,
            allow_loading_duplicates: false,
        }
    }
}

impl Settings {
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(Environment::with_prefix("HEARTH").try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .context("Failed to load configuration")
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            ignore_profile_errors: self.ignore_profile_errors,
            allow_loading_duplicates: self.allow_loading_duplicates,
        }
    }
}
