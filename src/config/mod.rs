pub mod endpoints;
pub mod policy;

pub use endpoints::Endpoints;
pub use policy::{PolicySettings, ProvisionPolicy};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file location: ~/.kubeadmin/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kubeadmin")
        .join("config.yaml")
}

/// Errors for loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config value for '{0}': must be greater than zero")]
    InvalidValue(&'static str),
}

/// The complete configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub policy: PolicySettings,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse settings from a YAML string
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    if let Some(field) = settings.policy.invalid_field() {
        return Err(ConfigError::InvalidValue(field));
    }
    Ok(settings)
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load settings from disk.
///
/// An explicitly requested file must exist. Without one, the default path is
/// tried and a missing file yields the built-in defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            parse_settings(&content)
        }
        None => {
            let path = default_config_path();
            if !path.exists() {
                return Ok(Settings::default());
            }
            let content = std::fs::read_to_string(&path)?;
            parse_settings(&content)
        }
    }
}
