//! Engine configuration, loaded from TOML or built in code.
//!
//! ```toml
//! missing_field = "abort"
//! retention_days = 30
//! default_actor = "system"
//! ```

use crate::error::ConfigError;
use crate::evaluator::MissingFieldPolicy;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How condition nodes treat fields the payload does not carry.
    pub missing_field: MissingFieldPolicy,
    /// Age in days after which finished executions are eligible for cleanup.
    pub retention_days: u32,
    /// Actor recorded for lifecycle operations when none is supplied.
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_field: MissingFieldPolicy::FallThrough,
            retention_days: 30,
            default_actor: "system".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}
