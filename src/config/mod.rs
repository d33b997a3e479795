use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Name of the configuration file inside a config directory
pub const CONFIG_FILE: &str = "sylva.json";

fn default_lock_resource() -> String {
    "sylva-reconciliation".to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SylvaConfig {
    /// Resource name handed to the distributed lock collaborator
    #[serde(default = "default_lock_resource")]
    pub lock_resource: String,
    /// Property names the export computer suppresses in addition to the
    /// built-in engine-derived set
    #[serde(default)]
    pub suppressed_properties: Vec<String>,
    /// Subtrees that survive even a force apply, in addition to the
    /// built-in protected set
    #[serde(default)]
    pub protected_paths: Vec<String>,
}

impl Default for SylvaConfig {
    fn default() -> Self {
        Self {
            lock_resource: default_lock_resource(),
            suppressed_properties: Vec::new(),
            protected_paths: Vec::new(),
        }
    }
}

/// Read the configuration file from a directory
pub fn read_config(dir: &Path) -> Result<Option<SylvaConfig>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);

    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path)?;
    let config: SylvaConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}

/// Write the configuration file to a directory
pub fn write_config(dir: &Path, config: &SylvaConfig) -> Result<(), ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    Ok(())
}
