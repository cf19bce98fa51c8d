/// Host runtime for script modules
///
/// This crate owns the two registries a host needs: the [`DispatchEngine`],
/// which runs triggers for host events on the dispatch thread, and the
/// [`ModuleManager`], which loads, unloads and reloads modules from any
/// thread. Both are created together by [`init`] and share one module table.
///
/// Modules register triggers through a [`ModuleApi`] handed to their entry
/// point. Hosts feed events in through a [`Hooks`] adapter or directly with
/// [`DispatchEngine::dispatch`].
pub mod adapter;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod manager;
pub mod metadata;
pub mod module;
pub mod module_scanner;
pub mod ordering;
pub mod reload;
pub mod source;
pub mod trigger;

mod shared;

pub use adapter::{HookAdapter, HookError, Hooks};
pub use api::ModuleApi;
pub use config::{ConfigLoadError, DispatchConfig, HostConfig, ScriptingConfig, data_dir};
pub use dispatch::{DispatchEngine, TriggerFault};
pub use error::{DispatchError, LoadError, MetadataError, RegisterError, UnloadError};
pub use filter::{ChatCriteria, Filter};
pub use manager::{LoadPass, LoadProgress, LoadReport, ModuleManager};
pub use metadata::{ModuleInfo, ModuleMetadata};
pub use module::{Module, ModuleId, ModuleState, ModuleSummary};
pub use module_scanner::{HotReloadSummary, ModuleScanner, ScanResult, apply_scan};
pub use reload::{ReloadRequests, listen_for_sigusr2};
pub use source::{
    DirectorySource, EntryPoint, FnSource, ModuleFolder, ModuleSource, ScriptRuntime,
    discover_modules,
};
pub use trigger::{Invocation, Priority, TriggerHandle, TriggerInfo, TriggerOptions};

pub use scriptling_events as events;

/// Create a dispatch engine and a module manager sharing one module table.
///
/// The engine must stay on the dispatch thread; the manager can be cloned
/// freely. Call [`DispatchEngine::shutdown`] to tear both down.
pub fn init(config: DispatchConfig) -> (DispatchEngine, ModuleManager) {
    let (shared, commands) = shared::Shared::new(config);
    let engine = DispatchEngine::new(shared.clone(), commands);
    let manager = ModuleManager::new(shared);
    (engine, manager)
}
