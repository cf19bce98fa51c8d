use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::ModuleApi;
use crate::error::{LoadError, UnloadError, panic_message};
use crate::module::{Module, ModuleState, ModuleSummary};
use crate::ordering::load_order;
use crate::shared::{EngineCommand, Shared};
use crate::source::ModuleSource;

/// Outcome of an entry pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Modules that reached Active, in load order
    pub loaded: Vec<String>,
    /// Modules that failed, with the reason
    pub failed: Vec<LoadError>,
    /// Library modules with no entry point
    pub skipped: Vec<String>,
}

/// Progress of a running entry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub done: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

/// An entry pass running on its loader thread
pub struct LoadPass {
    handle: JoinHandle<LoadReport>,
    progress: watch::Receiver<LoadProgress>,
}

impl LoadPass {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn progress(&self) -> watch::Receiver<LoadProgress> {
        self.progress.clone()
    }

    /// Wait for the pass to finish
    pub fn join(self) -> LoadReport {
        self.handle.join().unwrap_or_else(|_| {
            warn!(target: "modules", "Module loading thread panicked");
            LoadReport::default()
        })
    }
}

/// Loads, unloads and reloads modules.
///
/// Cloning gives another handle to the same module table, so a clone can be
/// moved to a loader thread while the dispatch thread keeps dispatching.
#[derive(Clone)]
pub struct ModuleManager {
    shared: Arc<Shared>,
}

impl ModuleManager {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Load a module and run its entry point on the calling thread.
    ///
    /// On failure the module stays in the table as Errored with every
    /// registration it made rolled back.
    pub fn load(&self, source: Arc<dyn ModuleSource>) -> Result<Arc<Module>, LoadError> {
        let metadata = source.metadata().clone();
        let name = metadata.name.clone();

        let module = {
            let mut table = self.shared.modules_mut();
            if let Some(existing) = table.get(&name) {
                if !existing.state().is_terminal() {
                    return Err(LoadError::AlreadyLoaded { name });
                }
            }
            let module = Arc::new(Module::new(self.shared.next_module_id(), metadata));
            table.insert(name.clone(), module.clone());
            module
        };
        self.shared.sources().insert(name.clone(), source.clone());

        debug!(target: "modules", "Loading module {} ({})", name, module.id());
        let outcome = self.run_entry(&module, source.as_ref());

        let _table = self.shared.modules_mut();
        self.finish(&module, outcome)
    }

    /// Remove every trigger of a module and mark it Unloaded.
    ///
    /// Unloading a module that is already Unloaded or Errored is a no-op.
    pub fn unload(&self, name: &str) -> Result<(), UnloadError> {
        let table = self.shared.modules_mut();
        let module = table
            .get(name)
            .ok_or_else(|| UnloadError::NotFound(name.to_string()))?;
        if module.shutdown() {
            info!(target: "modules", "Unloaded module {}", name);
        }
        self.shared.mark_dirty();
        Ok(())
    }

    /// Replace a module with a fresh instance built from the same source.
    pub fn reload(&self, name: &str) -> Result<Arc<Module>, LoadError> {
        let source = self
            .shared
            .sources()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })?;
        self.reload_from(source)
    }

    /// Replace a module with a fresh instance built from `source`.
    ///
    /// The new instance runs its entry point before anything changes. The
    /// old instance is then unloaded and the new one published in a single
    /// step, so a dispatch sees either every old trigger or every new one.
    pub fn reload_from(&self, source: Arc<dyn ModuleSource>) -> Result<Arc<Module>, LoadError> {
        let metadata = source.metadata().clone();
        let name = metadata.name.clone();

        let staged = Arc::new(Module::new(self.shared.next_module_id(), metadata));
        debug!(target: "modules", "Reloading module {} as {}", name, staged.id());
        let outcome = self.run_entry(&staged, source.as_ref());

        let mut table = self.shared.modules_mut();
        if let Some(old) = table.remove(&name) {
            old.shutdown();
            self.shared.mark_dirty();
        }
        table.insert(name.clone(), staged.clone());
        self.shared.sources().insert(name, source);
        self.finish(&staged, outcome)
    }

    /// Name, version and state of every module, sorted by name
    pub fn list_modules(&self) -> Vec<ModuleSummary> {
        self.shared.modules().values().map(|m| m.summary()).collect()
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.shared.modules().get(name).cloned()
    }

    /// Name of the module whose source was read from `path`
    pub fn module_at(&self, path: &Path) -> Option<String> {
        self.shared
            .sources()
            .iter()
            .find(|(_, s)| s.location() == Some(path))
            .map(|(name, _)| name.clone())
    }

    /// Load `sources` in dependency order on a loader thread.
    ///
    /// When the pass completes the dispatch engine is told the modules are
    /// ready and fires `gameLoad` on its next pump or dispatch.
    pub fn entry_pass(&self, sources: Vec<Arc<dyn ModuleSource>>) -> LoadPass {
        let (progress_tx, progress) = watch::channel(LoadProgress {
            done: 0,
            total: sources.len(),
        });
        let manager = self.clone();
        let handle = std::thread::spawn(move || manager.run_entry_pass(sources, &progress_tx));
        LoadPass { handle, progress }
    }

    /// Unload every module and run a new entry pass over the known sources
    pub fn reload_all(&self) -> LoadPass {
        let sources: Vec<Arc<dyn ModuleSource>> =
            self.shared.sources().values().cloned().collect();
        {
            let table = self.shared.modules_mut();
            for module in table.values() {
                module.shutdown();
            }
        }
        self.shared.mark_dirty();
        info!(target: "modules", "Reloading all modules ({} source(s))", sources.len());
        self.entry_pass(sources)
    }

    /// Unload a module and drop its source so `reload_all` no longer sees it
    pub fn forget(&self, name: &str) -> Result<(), UnloadError> {
        self.unload(name)?;
        self.shared.sources().remove(name);
        Ok(())
    }

    /// Unload every module and forget them and their sources
    pub fn teardown(&self) {
        let modules = std::mem::take(&mut *self.shared.modules_mut());
        for module in modules.values() {
            module.shutdown();
        }
        self.shared.sources().clear();
        self.shared.mark_dirty();
        if !modules.is_empty() {
            info!(target: "modules", "Tore down {} module(s)", modules.len());
        }
    }

    fn run_entry_pass(
        &self,
        sources: Vec<Arc<dyn ModuleSource>>,
        progress: &watch::Sender<LoadProgress>,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let total = sources.len();
        let mut done = 0;

        let metadata: Vec<_> = sources.iter().map(|s| s.metadata().clone()).collect();
        let plan = load_order(&metadata);
        let mut failed: HashSet<String> = HashSet::new();

        for (i, error) in plan.rejected {
            warn!(target: "modules", "{}", error);
            self.record_failure(sources[i].clone(), &error);
            failed.insert(metadata[i].name.to_lowercase());
            report.failed.push(error);
            done += 1;
            progress.send_replace(LoadProgress { done, total });
        }

        for i in plan.order {
            let source = sources[i].clone();
            let name = metadata[i].name.clone();

            let broken_dependency = metadata[i]
                .requires
                .iter()
                .find(|d| failed.contains(&d.to_lowercase()))
                .cloned();

            if let Some(dependency) = broken_dependency {
                let error = LoadError::DependencyFailed {
                    name: name.clone(),
                    dependency,
                };
                warn!(target: "modules", "{}", error);
                self.record_failure(source, &error);
                failed.insert(name.to_lowercase());
                report.failed.push(error);
            } else if !source.has_entry() {
                debug!(target: "modules", "Module {} has no entry point, skipping", name);
                self.shared.sources().insert(name.clone(), source);
                report.skipped.push(name);
            } else {
                match self.load(source) {
                    Ok(_) => report.loaded.push(name),
                    Err(error) => {
                        failed.insert(name.to_lowercase());
                        report.failed.push(error);
                    }
                }
            }

            done += 1;
            progress.send_replace(LoadProgress { done, total });
        }

        info!(
            target: "modules",
            "Entry pass finished: {} loaded, {} failed, {} skipped",
            report.loaded.len(),
            report.failed.len(),
            report.skipped.len()
        );

        self.shared.send(EngineCommand::ModulesReady(report.clone()));
        report
    }

    /// Put an Errored record in the table for a module that never ran
    fn record_failure(&self, source: Arc<dyn ModuleSource>, error: &LoadError) {
        let metadata = source.metadata().clone();
        let name = metadata.name.clone();
        let module = Arc::new(Module::new(self.shared.next_module_id(), metadata));
        module.fail(error.to_string());

        let mut table = self.shared.modules_mut();
        let replace = table.get(&name).is_none_or(|m| m.state().is_terminal());
        if replace {
            table.insert(name.clone(), module);
        }
        self.shared.sources().insert(name, source);
    }

    fn run_entry(&self, module: &Arc<Module>, source: &dyn ModuleSource) -> Result<(), LoadError> {
        let api = ModuleApi::new(module, self.shared.clone());
        let name = module.name().to_string();

        let result = catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            let entry = source.load()?;
            entry(&api)
        }));

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LoadError::EntryPoint {
                name,
                message: format!("{:#}", e),
            }),
            Err(panic) => Err(LoadError::Panicked {
                name,
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    /// Publish the result of an entry point. Must be called with the module
    /// table's write lock held.
    fn finish(
        &self,
        module: &Arc<Module>,
        outcome: Result<(), LoadError>,
    ) -> Result<Arc<Module>, LoadError> {
        match outcome {
            Ok(()) => {
                if module.transition(ModuleState::Loading, ModuleState::Active) {
                    info!(
                        target: "modules",
                        "Loaded module {} {} with {} trigger(s)",
                        module.name(),
                        module.metadata().version_or_default(),
                        module.trigger_count()
                    );
                    Ok(module.clone())
                } else {
                    module.shutdown();
                    self.shared.mark_dirty();
                    Err(LoadError::Interrupted {
                        name: module.name().to_string(),
                    })
                }
            }
            Err(e) => {
                error!(target: "modules", "{}", e);
                module.fail(e.to_string());
                self.shared.mark_dirty();
                Err(e)
            }
        }
    }
}
