//! Server configuration.
//!
//! ```toml
//! undo_limit = 50
//! fallback_package = "unknown"
//!
//! [[systems]]
//! id = "sales"
//! name = "Sales"
//! directory = "file:///workspace/sales"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base::is_valid_id;
use crate::index::{DEFAULT_FALLBACK_PACKAGE, PackageInfo};
use crate::sync::DEFAULT_UNDO_LIMIT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// A package registered at start-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub id: String,
    pub name: String,
    /// Root directory uri of the package.
    pub directory: String,
}

impl SystemConfig {
    pub fn to_package(&self) -> PackageInfo {
        PackageInfo::new(self.id.as_str(), self.name.clone(), self.directory.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Patches kept per model for undo. `0` disables undo.
    pub undo_limit: usize,
    /// Package of documents outside every system directory.
    pub fallback_package: String,
    pub systems: Vec<SystemConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            fallback_package: DEFAULT_FALLBACK_PACKAGE.to_string(),
            systems: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Package ids become qualified-name prefixes, so they must be identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_id(&self.fallback_package) {
            return Err(ConfigError::InvalidValue(format!(
                "fallback package '{}' is not a valid identifier",
                self.fallback_package
            )));
        }
        let mut seen = FxHashSet::default();
        for system in &self.systems {
            if !is_valid_id(&system.id) {
                return Err(ConfigError::InvalidValue(format!(
                    "system id '{}' is not a valid identifier",
                    system.id
                )));
            }
            if !seen.insert(system.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "system '{}' is declared twice",
                    system.id
                )));
            }
        }
        Ok(())
    }
}
