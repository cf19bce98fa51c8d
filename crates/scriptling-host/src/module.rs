use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::metadata::ModuleMetadata;
use crate::trigger::{Trigger, TriggerInfo};

/// Identity of one module instance. A reload produces a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ModuleState {
    Loading = 0,
    Active = 1,
    Errored = 2,
    Unloaded = 3,
}

impl ModuleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ModuleState::Loading,
            1 => ModuleState::Active,
            2 => ModuleState::Errored,
            _ => ModuleState::Unloaded,
        }
    }

    /// Errored and Unloaded instances never become Active again
    pub fn is_terminal(self) -> bool {
        matches!(self, ModuleState::Errored | ModuleState::Unloaded)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Loading => "loading",
            ModuleState::Active => "active",
            ModuleState::Errored => "errored",
            ModuleState::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

/// A loaded unit of user code and the triggers it owns.
///
/// State changes that must be atomic with respect to dispatch happen while
/// the manager holds the module table's write lock.
pub struct Module {
    id: ModuleId,
    metadata: ModuleMetadata,
    state: AtomicU8,
    triggers: Mutex<BTreeMap<u64, Arc<Trigger>>>,
    error: Mutex<Option<String>>,
}

impl Module {
    pub(crate) fn new(id: ModuleId, metadata: ModuleMetadata) -> Self {
        Self {
            id,
            metadata,
            state: AtomicU8::new(ModuleState::Loading as u8),
            triggers: Mutex::new(BTreeMap::new()),
            error: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn state(&self) -> ModuleState {
        ModuleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ModuleState::Active
    }

    /// Last load error, if the module is Errored
    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    pub fn owned_triggers(&self) -> Vec<TriggerInfo> {
        lock(&self.triggers).values().map(|t| t.info()).collect()
    }

    pub fn trigger_count(&self) -> usize {
        lock(&self.triggers).len()
    }

    pub(crate) fn triggers(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<Trigger>>> {
        lock(&self.triggers)
    }

    pub(crate) fn trigger(&self, seq: u64) -> Option<Arc<Trigger>> {
        lock(&self.triggers).get(&seq).cloned()
    }

    /// Move `from` -> `to`; fails if the module is no longer in `from`
    pub(crate) fn transition(&self, from: ModuleState, to: ModuleState) -> bool {
        let ok = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if ok {
            debug!(target: "modules", "Module {} ({}): {} -> {}", self.name(), self.id, from, to);
        }
        ok
    }

    /// Enter Errored, dropping every registration made so far
    pub(crate) fn fail(&self, message: String) {
        self.state.store(ModuleState::Errored as u8, Ordering::Release);
        *lock(&self.error) = Some(message);
        self.revoke_all();
        debug!(target: "modules", "Module {} ({}) -> errored", self.name(), self.id);
    }

    /// Enter Unloaded, dropping every trigger. Returns false if the module
    /// was already terminal.
    pub(crate) fn shutdown(&self) -> bool {
        let previous = ModuleState::from_u8(
            self.state.swap(ModuleState::Unloaded as u8, Ordering::AcqRel),
        );
        if previous == ModuleState::Errored {
            // Errored stays Errored
            self.state.store(ModuleState::Errored as u8, Ordering::Release);
        }
        self.revoke_all();
        if previous.is_terminal() {
            return false;
        }
        debug!(target: "modules", "Module {} ({}): {} -> unloaded", self.name(), self.id, previous);
        true
    }

    /// Remove one trigger. Returns false if it was already gone.
    pub(crate) fn release(&self, seq: u64) -> bool {
        let removed = lock(&self.triggers).remove(&seq);
        match removed {
            Some(trigger) => {
                trigger.retire();
                true
            }
            None => false,
        }
    }

    fn revoke_all(&self) {
        let revoked = std::mem::take(&mut *lock(&self.triggers));
        for trigger in revoked.values() {
            trigger.retire();
        }
    }

    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            name: self.name().to_string(),
            version: self.metadata.version_or_default().to_string(),
            state: self.state(),
            triggers: self.trigger_count(),
            error: self.error(),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .field("triggers", &self.trigger_count())
            .finish()
    }
}

/// One row of the module listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub version: String,
    pub state: ModuleState,
    pub triggers: usize,
    pub error: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
