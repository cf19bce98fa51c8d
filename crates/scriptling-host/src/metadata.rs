use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// File read from every module folder
pub const METADATA_FILE: &str = "metadata.toml";

/// Descriptive information about a module.
///
/// ```toml
/// name = "chat-tools"
/// version = "1.2.0"
/// entry = "index.js"
/// creator = "someone"
/// description = "Chat helpers"
/// tags = ["chat"]
/// requires = ["common-lib"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Entry point handed to the script runtime. Modules without one are
    /// libraries and are not run by the entry pass.
    #[serde(default)]
    pub entry: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, alias = "author")]
    pub creator: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Modules that must be loaded first
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ModuleMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requires(mut self, dependency: impl Into<String>) -> Self {
        self.requires.push(dependency.into());
        self
    }

    /// Version string for display
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }

    /// Read `metadata.toml` from a module folder. A missing name falls back
    /// to the folder name.
    pub fn read(dir: &Path) -> Result<Self, MetadataError> {
        let path = dir.join(METADATA_FILE);
        if !path.is_file() {
            return Err(MetadataError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|source| MetadataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut metadata: ModuleMetadata =
            toml::from_str(&content).map_err(|source| MetadataError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if metadata.name.trim().is_empty() {
            metadata.name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if metadata.name.trim().is_empty() {
            return Err(MetadataError::EmptyName);
        }

        Ok(metadata)
    }
}

/// Name and version, as reported to a module about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}
