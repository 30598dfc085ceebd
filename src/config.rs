//! Engine configuration
//!
//! Loads engine settings from YAML. Every field has a default, so an empty
//! document (or no document at all) yields a working configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::EngineError;

/// Environment variable naming a YAML configuration file
pub const CONFIG_ENV_VAR: &str = "WIDGET_SCHEMA_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub formatter: FormatterConfig,
}

/// Schema reference resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of nested schema references on one path
    pub max_depth: usize,
    /// Resolve sibling subtrees concurrently
    pub parallel_siblings: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            parallel_siblings: true,
        }
    }
}

/// Locale-style date/time rendering. Patterns use chrono `strftime` syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Offset from UTC applied to epoch timestamps
    pub utc_offset_minutes: i32,
    pub datetime_pattern: String,
    pub time_pattern: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            datetime_pattern: "%-m/%-d/%Y, %-I:%M:%S %p".to_string(),
            time_pattern: "%-I:%M:%S %p".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse engine configuration")
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading engine configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `WIDGET_SCHEMA_CONFIG`, or defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        if self.resolver.max_depth == 0 {
            return Err(EngineError::Config(
                "resolver.max_depth must be at least 1".to_string(),
            ));
        }
        // chrono::FixedOffset only accepts offsets strictly inside one day
        if self.formatter.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(EngineError::Config(format!(
                "formatter.utc_offset_minutes out of range: {}",
                self.formatter.utc_offset_minutes
            )));
        }
        Ok(())
    }
}
