//! Configuration management for Tessera
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (TESSERA_* prefix, `__` between section and key)
//! 2. tessera.local.toml (gitignored, local overrides)
//! 3. tessera.toml (git-tracked, project config)
//! 4. ~/.config/tessera/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Default upper bound on an encoded tuple, in bytes.
pub const DEFAULT_MAX_TUPLE_SIZE: usize = 1024 * 1024;

/// Main Tessera configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    pub space: SpaceConfig,
    pub recovery: RecoveryConfig,
}

/// Limits applied to spaces created by a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Largest accepted encoded tuple, in bytes.
    pub max_tuple_size: usize,
    /// Enforce a space's declared field count on every write.
    pub exact_field_count: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            max_tuple_size: DEFAULT_MAX_TUPLE_SIZE,
            exact_field_count: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Start in normal write mode. When `false` the database starts in
    /// recovery mode, where inserts replace existing tuples.
    pub complete_on_open: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            complete_on_open: true,
        }
    }
}

impl TesseraConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML document, without layering.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for replaying a snapshot: starts in recovery mode.
    pub fn recovery() -> Self {
        Self {
            recovery: RecoveryConfig {
                complete_on_open: false,
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.space.max_tuple_size == 0 {
            return Err(ConfigError::ValidationError(
                "space.max_tuple_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
