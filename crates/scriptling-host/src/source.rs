//! Where modules come from.
//!
//! A [`ModuleSource`] describes a module and can produce its entry point on
//! demand. Running the entry point is the only thing the host knows about
//! script code; the language runtime behind it is pluggable through
//! [`ScriptRuntime`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::ModuleApi;
use crate::config::ScriptingConfig;
use crate::error::MetadataError;
use crate::metadata::{METADATA_FILE, ModuleMetadata};

/// Runs a module's top-level code, registering its triggers
pub type EntryPoint = Box<dyn FnOnce(&ModuleApi) -> anyhow::Result<()> + Send>;

pub trait ModuleSource: Send + Sync {
    fn metadata(&self) -> &ModuleMetadata;

    /// Prepare the entry point. Called again for every reload.
    fn load(&self) -> anyhow::Result<EntryPoint>;

    /// Library modules have nothing to run and are skipped by the entry pass
    fn has_entry(&self) -> bool {
        true
    }

    /// Folder the module was read from, if any
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// A module implemented in Rust, built from a reusable closure
pub struct FnSource {
    metadata: ModuleMetadata,
    entry: Arc<dyn Fn(&ModuleApi) -> anyhow::Result<()> + Send + Sync>,
}

impl FnSource {
    pub fn new<F>(metadata: ModuleMetadata, entry: F) -> Self
    where
        F: Fn(&ModuleApi) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            metadata,
            entry: Arc::new(entry),
        }
    }

    pub fn into_source(self) -> Arc<dyn ModuleSource> {
        Arc::new(self)
    }
}

impl ModuleSource for FnSource {
    fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    fn load(&self) -> anyhow::Result<EntryPoint> {
        let entry = self.entry.clone();
        Ok(Box::new(move |api: &ModuleApi| entry(api)))
    }
}

/// A module folder on disk
#[derive(Debug, Clone)]
pub struct ModuleFolder {
    pub path: PathBuf,
    pub metadata: ModuleMetadata,
}

impl ModuleFolder {
    /// Path of the entry file, if the module has one
    pub fn entry_path(&self) -> Option<PathBuf> {
        self.metadata.entry.as_ref().map(|e| self.path.join(e))
    }
}

/// Turns a module folder's entry file into something the host can run
pub trait ScriptRuntime: Send + Sync {
    fn prepare(&self, module: &ModuleFolder) -> anyhow::Result<EntryPoint>;
}

/// A module read from a folder containing `metadata.toml`
pub struct DirectorySource {
    folder: ModuleFolder,
    runtime: Arc<dyn ScriptRuntime>,
}

impl DirectorySource {
    pub fn open(path: &Path, runtime: Arc<dyn ScriptRuntime>) -> Result<Self, MetadataError> {
        let metadata = ModuleMetadata::read(path)?;
        Ok(Self {
            folder: ModuleFolder {
                path: path.to_path_buf(),
                metadata,
            },
            runtime,
        })
    }

    pub fn folder(&self) -> &ModuleFolder {
        &self.folder
    }
}

impl ModuleSource for DirectorySource {
    fn metadata(&self) -> &ModuleMetadata {
        &self.folder.metadata
    }

    fn load(&self) -> anyhow::Result<EntryPoint> {
        self.runtime.prepare(&self.folder)
    }

    fn has_entry(&self) -> bool {
        self.folder.metadata.entry.is_some()
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.folder.path)
    }
}

/// Find every module folder under `dir`.
///
/// Folders without readable metadata are skipped with a warning, as are
/// modules disabled in config and names that repeat (ignoring case) an
/// earlier folder. The result is sorted by module name.
pub fn discover_modules(
    dir: &Path,
    runtime: Arc<dyn ScriptRuntime>,
    config: &ScriptingConfig,
) -> Vec<Arc<dyn ModuleSource>> {
    let mut found: Vec<DirectorySource> = Vec::new();

    if !dir.exists() {
        info!(
            target: "modules",
            "Modules directory does not exist: {} (this is fine if no modules are installed)",
            dir.display()
        );
        return Vec::new();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                target: "modules",
                "Failed to read modules directory {}: {}",
                dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(METADATA_FILE).is_file())
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    for path in paths {
        let source = match DirectorySource::open(&path, runtime.clone()) {
            Ok(source) => source,
            Err(e) => {
                warn!(target: "modules", "Skipping module folder {}: {}", path.display(), e);
                continue;
            }
        };

        let name = source.metadata().name.clone();
        if !seen.insert(name.to_lowercase()) {
            warn!(
                target: "modules",
                "Skipping {}: a module named '{}' was already found",
                path.display(),
                name
            );
            continue;
        }

        if !config.is_module_enabled(&name) {
            info!(target: "modules", "Skipping disabled module: {} ({})", name, path.display());
            continue;
        }

        debug!(target: "modules", "Discovered module {} in {}", name, path.display());
        found.push(source);
    }

    found.sort_by(|a, b| a.metadata().name.cmp(&b.metadata().name));
    found
        .into_iter()
        .map(|s| Arc::new(s) as Arc<dyn ModuleSource>)
        .collect()
}
