//! Database configuration
//!
//! Loaded from TOML or assembled in code; validated before a database opens.
//!
//! ```toml
//! name = "library.db"
//! version = 2
//! mode = "update"
//! rollback_allowed = true
//! rollback_history_size = 3
//! fetch_depth = 3
//! ```

use crate::db::IN_MEMORY;
use crate::errors::{config_error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabula_core::CreationMode;

pub const DEFAULT_ROLLBACK_HISTORY_SIZE: usize = 3;
pub const DEFAULT_FETCH_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfiguration {
    /// Database file path, or `:memory:`
    pub name: String,
    /// Target schema version, at least 1
    pub version: i64,
    pub mode: CreationMode,
    pub rollback_allowed: bool,
    /// Snapshots kept for rollback; oldest evicted first
    pub rollback_history_size: usize,
    /// Maximum depth of EAGER relation loading
    pub fetch_depth: usize,
}

impl Default for DatabaseConfiguration {
    fn default() -> Self {
        Self {
            name: IN_MEMORY.to_string(),
            version: 1,
            mode: CreationMode::Update,
            rollback_allowed: false,
            rollback_history_size: DEFAULT_ROLLBACK_HISTORY_SIZE,
            fetch_depth: DEFAULT_FETCH_DEPTH,
        }
    }
}

impl DatabaseConfiguration {
    pub fn new(name: impl Into<String>, version: i64) -> Self {
        Self {
            name: name.into(),
            version,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: CreationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rollback(mut self, allowed: bool, history_size: usize) -> Self {
        self.rollback_allowed = allowed;
        self.rollback_history_size = history_size;
        self
    }

    pub fn with_fetch_depth(mut self, depth: usize) -> Self {
        self.fetch_depth = depth;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    ///
    /// Returns a Configuration error for malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| config_error(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns a Configuration error if the file cannot be read or is invalid.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// Returns a Configuration error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(config_error("name cannot be empty"));
        }
        if self.version < 1 {
            return Err(config_error(format!(
                "version must be >= 1, got {}",
                self.version
            )));
        }
        if self.fetch_depth < 1 {
            return Err(config_error("fetch_depth must be >= 1"));
        }
        if self.rollback_allowed && self.rollback_history_size < 1 {
            return Err(config_error(
                "rollback_history_size must be >= 1 when rollback is allowed",
            ));
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == IN_MEMORY
    }
}
