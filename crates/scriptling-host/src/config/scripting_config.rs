use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::project_dirs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Whether modules are loaded at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory containing module folders (default: <data dir>/modules)
    #[serde(default)]
    pub modules_dir: Option<PathBuf>,

    /// Per-module configuration (module name -> config values)
    #[serde(default)]
    pub modules: HashMap<String, toml::Value>,

    /// Whether hot reload is enabled (default: true)
    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,

    /// Hot reload scan interval in milliseconds (default: 1000ms)
    #[serde(default = "default_hot_reload_interval")]
    pub hot_reload_interval_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_hot_reload() -> bool {
    true
}

fn default_hot_reload_interval() -> u64 {
    1000
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            modules_dir: None,
            modules: HashMap::new(),
            hot_reload: true,
            hot_reload_interval_ms: 1000,
        }
    }
}

impl ScriptingConfig {
    /// Get the modules directory path (use provided or default)
    pub fn modules_dir(&self) -> PathBuf {
        self.modules_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|p| p.data_dir().join("modules"))
                .unwrap_or_else(|| PathBuf::from(".modules"))
        })
    }

    /// Whether a module may be loaded. Modules missing from the config are
    /// enabled.
    pub fn is_module_enabled(&self, name: &str) -> bool {
        self.modules
            .get(name)
            .and_then(|config: &toml::Value| config.get("enabled"))
            .and_then(|v: &toml::Value| v.as_bool())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScriptingConfig::default();
        assert!(config.enabled);
        assert!(config.hot_reload);
        assert_eq!(config.hot_reload_interval_ms, 1000);
        assert!(config.is_module_enabled("anything"));
    }

    #[test]
    fn test_module_can_be_disabled() {
        let config: ScriptingConfig = toml::from_str(
            r#"
            [modules.noisy]
            enabled = false

            [modules.quiet]
            volume = 3
            "#,
        )
        .unwrap();

        assert!(!config.is_module_enabled("noisy"));
        assert!(config.is_module_enabled("quiet"));
        assert!(config.enabled);
    }

    #[test]
    fn test_explicit_modules_dir() {
        let config = ScriptingConfig {
            modules_dir: Some(PathBuf::from("/srv/modules")),
            ..Default::default()
        };
        assert_eq!(config.modules_dir(), PathBuf::from("/srv/modules"));
    }
}
