//! Runtime configuration (hostbind.toml)
//!
//! ```toml
//! [runtime]
//! max_heap_size = 100000
//!
//! [engine]
//! default_access = "read_only"
//! null_export = "undefined"
//! max_nested_depth = 64
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;

use hostbind_engine::EngineOptions;
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Runtime-wide switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Bound on live managed objects (proxies, script functions, module
    /// records) across every engine of the runtime
    pub max_heap_size: Option<usize>,
}

/// Parsed hostbind.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// `[runtime]` table
    pub runtime: RuntimeOptions,
    /// `[engine]` table; defaults for engines the runtime creates
    pub engine: EngineOptions,
}

impl RuntimeConfig {
    /// Parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.runtime.max_heap_size == Some(0) {
            return Err(RuntimeError::Config("max_heap_size must be positive".to_string()));
        }
        if self.engine.max_nested_depth == 0 {
            return Err(RuntimeError::Config("max_nested_depth must be positive".to_string()));
        }
        Ok(())
    }
}
