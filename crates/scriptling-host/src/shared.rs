//! State shared between the dispatch thread and module loaders.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use scriptling_events::TriggerType;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::config::DispatchConfig;
use crate::manager::LoadReport;
use crate::module::{Module, ModuleId};
use crate::source::ModuleSource;
use crate::trigger::{Priority, Trigger};

/// Index changes queued for the dispatch thread
pub(crate) enum EngineCommand {
    Insert {
        trigger_type: TriggerType,
        key: (Priority, u64),
        trigger: Weak<Trigger>,
    },
    Rekey {
        trigger_type: TriggerType,
        old: (Priority, u64),
        new: (Priority, u64),
        trigger: Weak<Trigger>,
    },
    ModulesReady(LoadReport),
}

pub(crate) type ModuleTable = BTreeMap<String, Arc<Module>>;

pub(crate) struct Shared {
    modules: RwLock<ModuleTable>,
    sources: Mutex<BTreeMap<String, Arc<dyn ModuleSource>>>,
    commands: UnboundedSender<EngineCommand>,
    next_seq: AtomicU64,
    next_module_id: AtomicU64,
    index_dirty: AtomicBool,
    pub(crate) config: DispatchConfig,
}

impl Shared {
    pub(crate) fn new(config: DispatchConfig) -> (Arc<Self>, UnboundedReceiver<EngineCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Self {
            modules: RwLock::new(BTreeMap::new()),
            sources: Mutex::new(BTreeMap::new()),
            commands,
            next_seq: AtomicU64::new(1),
            next_module_id: AtomicU64::new(1),
            index_dirty: AtomicBool::new(false),
            config,
        });
        (shared, rx)
    }

    pub(crate) fn modules(&self) -> RwLockReadGuard<'_, ModuleTable> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn modules_mut(&self) -> RwLockWriteGuard<'_, ModuleTable> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn sources(&self) -> MutexGuard<'_, BTreeMap<String, Arc<dyn ModuleSource>>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_module_id(&self) -> ModuleId {
        ModuleId(self.next_module_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            debug!(target: "dispatch", "Dispatch engine is gone, dropping index update");
        }
    }

    /// Note that triggers were dropped and the index has dead entries
    pub(crate) fn mark_dirty(&self) {
        self.index_dirty.store(true, Ordering::Release);
    }

    pub(crate) fn take_dirty(&self) -> bool {
        self.index_dirty.swap(false, Ordering::AcqRel)
    }

    /// Module instance with the given id, if still in the table
    pub(crate) fn module_by_id(&self, id: ModuleId) -> Option<Arc<Module>> {
        self.modules().values().find(|m| m.id() == id).cloned()
    }
}
