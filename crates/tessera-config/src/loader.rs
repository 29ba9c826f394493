//! Configuration loader with multi-source merging

use crate::{Paths, TesseraConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_vars: Option<HashMap<String, String>>,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "TESSERA".to_string(),
            env_vars: None,
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "TESSERA")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Skip ~/.config/tessera/config.toml.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<TesseraConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = TesseraConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/tessera/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(toml_file(user_config_file));
                }
            }
        }

        // 3. Project config (tessera.toml), then local overrides
        for file in [
            Paths::project_config_file(&self.project_dir),
            Paths::local_config_file(&self.project_dir),
        ] {
            if file.exists() {
                builder = builder.add_source(toml_file(file));
            }
        }

        // 4. Environment variables: TESSERA_SPACE__MAX_TUPLE_SIZE=4096
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let tessera_config: TesseraConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        tessera_config.validate()?;

        Ok(tessera_config)
    }

    /// Load configuration or return defaults if loading fails
    pub fn load_or_default(self) -> TesseraConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_file(path: PathBuf) -> config::File<config::FileSourceFile, config::FileFormat> {
    config::File::from(path)
        .required(false)
        .format(config::FileFormat::Toml)
}
