//! Module folder change detection for hot reloading
//!
//! A module counts as changed when the newest modification time of any file
//! inside its folder moves. Only folders that contain `metadata.toml` are
//! considered modules.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::config::ScriptingConfig;
use crate::manager::ModuleManager;
use crate::metadata::METADATA_FILE;
use crate::source::{DirectorySource, ModuleSource, ScriptRuntime};

/// Default scan interval (1000ms = 1Hz)
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(1000);

/// Result of scanning for module changes
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Module folders whose contents changed (folder and newest mtime)
    pub changed: Vec<(PathBuf, SystemTime)>,
    /// Module folders that appeared
    pub added: Vec<PathBuf>,
    /// Module folders that disappeared
    pub removed: Vec<PathBuf>,
}

impl ScanResult {
    /// Returns true if there are any changes detected
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
    }
}

pub struct ModuleScanner {
    modules_dir: PathBuf,
    scan_interval: Duration,
    last_scan: Option<Instant>,
    /// Module folder -> newest modification time seen on the last scan
    cached_state: HashMap<PathBuf, SystemTime>,
}

impl ModuleScanner {
    pub fn new(modules_dir: PathBuf) -> Self {
        Self::with_interval(modules_dir, DEFAULT_SCAN_INTERVAL)
    }

    pub fn with_interval(modules_dir: PathBuf, scan_interval: Duration) -> Self {
        // Pre-populate so the modules present at startup aren't reported as added
        let cached_state = Self::module_folders(&modules_dir);

        Self {
            modules_dir,
            scan_interval,
            last_scan: None,
            cached_state,
        }
    }

    pub fn should_scan(&self) -> bool {
        match self.last_scan {
            Some(last) => last.elapsed() >= self.scan_interval,
            None => true,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn tracked(&self) -> usize {
        self.cached_state.len()
    }

    pub fn scan_changes(&mut self) -> ScanResult {
        self.last_scan = Some(Instant::now());

        let current_state = Self::module_folders(&self.modules_dir);
        let mut result = ScanResult::default();

        for (path, modified) in &current_state {
            match self.cached_state.get(path) {
                Some(cached) if cached != modified => {
                    debug!(target: "modules", "Module changed: {}", path.display());
                    result.changed.push((path.clone(), *modified));
                }
                Some(_) => {}
                None => {
                    debug!(target: "modules", "Module added: {}", path.display());
                    result.added.push(path.clone());
                }
            }
        }

        for path in self.cached_state.keys() {
            if !current_state.contains_key(path) {
                debug!(target: "modules", "Module removed: {}", path.display());
                result.removed.push(path.clone());
            }
        }

        result.changed.sort();
        result.added.sort();
        result.removed.sort();

        self.cached_state = current_state;
        result
    }

    fn module_folders(modules_dir: &Path) -> HashMap<PathBuf, SystemTime> {
        let mut folders = HashMap::new();

        let entries = match std::fs::read_dir(modules_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if modules_dir.exists() {
                    warn!(
                        target: "modules",
                        "Failed to read modules directory {}: {}",
                        modules_dir.display(),
                        e
                    );
                }
                return folders;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || !path.join(METADATA_FILE).is_file() {
                continue;
            }
            if let Some(modified) = newest_mtime(&path) {
                folders.insert(path, modified);
            }
        }

        folders
    }
}

/// Newest modification time of any file below `dir`
fn newest_mtime(dir: &Path) -> Option<SystemTime> {
    let mut newest: Option<SystemTime> = None;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                pending.push(entry.path());
            } else if let Ok(modified) = metadata.modified() {
                newest = Some(newest.map_or(modified, |n| n.max(modified)));
            }
        }
    }

    newest
}

/// What applying a scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotReloadSummary {
    pub reloaded: Vec<String>,
    pub loaded: Vec<String>,
    pub unloaded: Vec<String>,
    pub failed: Vec<String>,
}

/// Apply a scan: reload changed modules, load new ones, unload removed ones.
pub fn apply_scan(
    manager: &ModuleManager,
    scan: &ScanResult,
    runtime: &Arc<dyn ScriptRuntime>,
    config: &ScriptingConfig,
) -> HotReloadSummary {
    let mut summary = HotReloadSummary::default();

    for path in &scan.removed {
        if let Some(name) = manager.module_at(path) {
            if manager.forget(&name).is_ok() {
                summary.unloaded.push(name);
            }
        }
    }

    let touched = scan
        .changed
        .iter()
        .map(|(path, _)| (path, true))
        .chain(scan.added.iter().map(|path| (path, false)));

    for (path, changed) in touched {
        let source = match DirectorySource::open(path, runtime.clone()) {
            Ok(source) => Arc::new(source) as Arc<dyn ModuleSource>,
            Err(e) => {
                warn!(target: "modules", "Cannot reload {}: {}", path.display(), e);
                summary.failed.push(path.display().to_string());
                continue;
            }
        };
        let name = source.metadata().name.clone();
        if !config.is_module_enabled(&name) || !source.has_entry() {
            continue;
        }

        // A rename inside metadata.toml leaves the old name behind
        if let Some(previous) = manager.module_at(path) {
            if previous != name {
                let _ = manager.forget(&previous);
                summary.unloaded.push(previous);
            }
        }

        let result = if changed || manager.module(&name).is_some() {
            manager.reload_from(source)
        } else {
            manager.load(source)
        };

        match result {
            Ok(_) if changed => summary.reloaded.push(name),
            Ok(_) => summary.loaded.push(name),
            Err(_) => summary.failed.push(name),
        }
    }

    if !summary.reloaded.is_empty() || !summary.loaded.is_empty() || !summary.unloaded.is_empty() {
        info!(
            target: "modules",
            "Hot reload: {} reloaded, {} loaded, {} unloaded, {} failed",
            summary.reloaded.len(),
            summary.loaded.len(),
            summary.unloaded.len(),
            summary.failed.len()
        );
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_module(root: &Path, folder: &str) -> PathBuf {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(METADATA_FILE),
            format!("name = \"{folder}\"\nentry = \"main.js\"\n"),
        )
        .unwrap();
        fs::write(dir.join("main.js"), "// entry").unwrap();
        dir
    }

    #[test]
    fn test_scanner_creation() {
        let dir = PathBuf::from("/tmp/test");
        let scanner = ModuleScanner::new(dir.clone());

        assert_eq!(scanner.modules_dir, dir);
        assert_eq!(scanner.scan_interval(), DEFAULT_SCAN_INTERVAL);
        assert!(scanner.should_scan());
    }

    #[test]
    fn test_should_scan_timing() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner =
            ModuleScanner::with_interval(temp_dir.path().to_path_buf(), Duration::from_millis(50));

        assert!(scanner.should_scan());
        scanner.scan_changes();
        assert!(!scanner.should_scan());

        std::thread::sleep(Duration::from_millis(60));
        assert!(scanner.should_scan());
    }

    #[test]
    fn test_existing_modules_are_not_added() {
        let temp_dir = TempDir::new().unwrap();
        create_module(temp_dir.path(), "present");

        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf());
        assert_eq!(scanner.tracked(), 1);
        assert!(!scanner.scan_changes().has_changes());
    }

    #[test]
    fn test_detect_new_module() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf());

        let module = create_module(temp_dir.path(), "fresh");
        let result = scanner.scan_changes();
        assert_eq!(result.added, vec![module]);
        assert!(result.changed.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_detect_modified_nested_file() {
        let temp_dir = TempDir::new().unwrap();
        let module = create_module(temp_dir.path(), "nested");
        fs::create_dir(module.join("lib")).unwrap();
        fs::write(module.join("lib").join("util.js"), "v1").unwrap();

        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf());

        // Ensure a different timestamp
        std::thread::sleep(Duration::from_millis(20));
        let mut file = File::create(module.join("lib").join("util.js")).unwrap();
        file.write_all(b"v2").unwrap();
        drop(file);

        let result = scanner.scan_changes();
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].0, module);
    }

    #[test]
    fn test_detect_removed_module() {
        let temp_dir = TempDir::new().unwrap();
        let module = create_module(temp_dir.path(), "doomed");
        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf());

        fs::remove_dir_all(&module).unwrap();
        let result = scanner.scan_changes();
        assert_eq!(result.removed, vec![module]);
    }

    #[test]
    fn test_ignores_folders_without_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf());

        fs::create_dir(temp_dir.path().join("assets")).unwrap();
        File::create(temp_dir.path().join("readme.txt")).unwrap();

        assert!(!scanner.scan_changes().has_changes());
        assert_eq!(scanner.tracked(), 0);
    }

    #[test]
    fn test_handles_missing_directory() {
        let mut scanner = ModuleScanner::new(PathBuf::from("/tmp/this_does_not_exist_12345"));
        assert!(!scanner.scan_changes().has_changes());
    }
}
