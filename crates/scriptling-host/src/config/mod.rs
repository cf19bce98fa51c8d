pub mod dispatch_config;
pub mod scripting_config;

use std::{fs, path::Path, path::PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use dispatch_config::DispatchConfig;
pub use scripting_config::ScriptingConfig;

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "scriptling")
}

/// Data directory holding modules and logs
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|p| p.data_dir().to_path_buf())
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("IO error reading config: {0}")]
    IoError(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Module loading and hot reload
    #[serde(default)]
    pub scripting: ScriptingConfig,

    /// Dispatch engine limits
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl HostConfig {
    pub fn config_path() -> PathBuf {
        project_dirs()
            .map(|p| p.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".scriptling").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = HostConfig::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotFound));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[dispatch\nmin_priority = ").unwrap();
        let err = HostConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::ParseError(_)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[dispatch]\nmax_faults = 3\n").unwrap();

        let config = HostConfig::load_from(&path).unwrap();
        assert_eq!(config.dispatch.max_faults, Some(3));
        assert_eq!(config.dispatch.min_priority, -1000);
        assert_eq!(config.dispatch.fault_log_capacity, 64);
        assert!(config.scripting.enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = HostConfig::default();
        config.scripting.hot_reload = false;
        config.dispatch.max_priority = 50;
        config.save_to(&path).unwrap();

        let loaded = HostConfig::load_from(&path).unwrap();
        assert!(!loaded.scripting.hot_reload);
        assert_eq!(loaded.dispatch.max_priority, 50);
    }
}
