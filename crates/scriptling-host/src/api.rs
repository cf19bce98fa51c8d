use std::sync::{Arc, Weak};

use scriptling_events::{EventContext, TriggerType};
use tracing::debug;

use crate::error::RegisterError;
use crate::filter::CompiledFilter;
use crate::metadata::ModuleInfo;
use crate::module::{Module, ModuleState};
use crate::shared::{EngineCommand, Shared};
use crate::trigger::{Invocation, Priority, Trigger, TriggerHandle, TriggerInfo, TriggerOptions};

/// Registration capability handed to a module's entry point and callbacks.
///
/// Every trigger registered through a `ModuleApi` belongs to the module it
/// was created for. Cloning is cheap; a clone that outlives its module
/// reports `ModuleNotActive`.
#[derive(Clone)]
pub struct ModuleApi {
    module: Weak<Module>,
    name: Arc<str>,
    shared: Arc<Shared>,
}

impl ModuleApi {
    pub(crate) fn new(module: &Arc<Module>, shared: Arc<Shared>) -> Self {
        Self {
            module: Arc::downgrade(module),
            name: Arc::from(module.name()),
            shared,
        }
    }

    /// Register a callback for the trigger type called `type_name`.
    pub fn on<F>(
        &self,
        type_name: &str,
        callback: F,
        options: TriggerOptions,
    ) -> Result<TriggerHandle, RegisterError>
    where
        F: FnMut(&mut EventContext, &Invocation<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        let trigger_type = TriggerType::lookup(type_name)?;
        self.on_type(trigger_type, callback, options)
    }

    pub fn on_type<F>(
        &self,
        trigger_type: TriggerType,
        callback: F,
        mut options: TriggerOptions,
    ) -> Result<TriggerHandle, RegisterError>
    where
        F: FnMut(&mut EventContext, &Invocation<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        let module = self.accepting_module()?;
        self.check_priority(options.priority)?;
        if options.max_invocations == Some(0) {
            return Err(RegisterError::InvalidInvocationLimit);
        }

        let filter = options
            .filter
            .take()
            .map(|f| CompiledFilter::compile(f, trigger_type))
            .transpose()?;

        let seq = self.shared.next_seq();
        let handle = TriggerHandle {
            module: module.id(),
            seq,
        };
        let priority = options.priority;
        let trigger = Arc::new(Trigger::new(
            handle,
            trigger_type,
            options,
            filter,
            self.name.clone(),
            Arc::downgrade(&module),
            Box::new(callback),
        ));

        {
            let mut triggers = module.triggers();
            // Re-check under the lock so an unload racing with this call
            // cannot leave a trigger behind.
            if module.state().is_terminal() {
                return Err(self.not_active(module.state()));
            }
            triggers.insert(seq, trigger.clone());
        }

        self.shared.send(EngineCommand::Insert {
            trigger_type,
            key: (priority, seq),
            trigger: Arc::downgrade(&trigger),
        });

        debug!(
            target: "modules",
            "Module {} registered {} trigger {} at priority {}",
            self.name, trigger_type, handle, priority
        );

        Ok(handle)
    }

    /// Remove a trigger this module owns. Removing an unknown or already
    /// removed handle does nothing and returns false.
    pub fn off(&self, handle: TriggerHandle) -> bool {
        let Some(module) = self.module.upgrade() else {
            return false;
        };
        if module.id() != handle.module {
            return false;
        }
        let removed = module.release(handle.seq);
        if removed {
            self.shared.mark_dirty();
            debug!(target: "modules", "Module {} unregistered trigger {}", self.name, handle);
        }
        removed
    }

    /// Enable or disable a trigger without removing it
    pub fn set_enabled(&self, handle: TriggerHandle, enabled: bool) -> bool {
        match self.own_trigger(handle) {
            Some(trigger) => {
                trigger.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Move a trigger to a new position in its type's order
    pub fn set_priority(
        &self,
        handle: TriggerHandle,
        priority: impl Into<Priority>,
    ) -> Result<bool, RegisterError> {
        let priority = priority.into();
        self.check_priority(priority)?;
        let Some(trigger) = self.own_trigger(handle) else {
            return Ok(false);
        };
        let old = trigger.set_priority(priority);
        if old != priority {
            self.shared.send(EngineCommand::Rekey {
                trigger_type: trigger.trigger_type(),
                old: (old, handle.seq),
                new: (priority, handle.seq),
                trigger: Arc::downgrade(&trigger),
            });
        }
        Ok(true)
    }

    pub fn module_info(&self) -> ModuleInfo {
        let version = self
            .module
            .upgrade()
            .map(|m| m.metadata().version_or_default().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        ModuleInfo {
            name: self.name.to_string(),
            version,
        }
    }

    /// Triggers currently owned by this module
    pub fn triggers(&self) -> Vec<TriggerInfo> {
        self.module
            .upgrade()
            .map(|m| m.owned_triggers())
            .unwrap_or_default()
    }

    fn accepting_module(&self) -> Result<Arc<Module>, RegisterError> {
        let Some(module) = self.module.upgrade() else {
            return Err(self.not_active(ModuleState::Unloaded));
        };
        let state = module.state();
        if state.is_terminal() {
            return Err(self.not_active(state));
        }
        Ok(module)
    }

    fn own_trigger(&self, handle: TriggerHandle) -> Option<Arc<Trigger>> {
        let module = self.module.upgrade()?;
        if module.id() != handle.module {
            return None;
        }
        module.trigger(handle.seq)
    }

    fn check_priority(&self, priority: Priority) -> Result<(), RegisterError> {
        let config = &self.shared.config;
        if config.priority_allowed(priority.0) {
            Ok(())
        } else {
            Err(RegisterError::InvalidPriority {
                priority: priority.0,
                min: config.min_priority,
                max: config.max_priority,
            })
        }
    }

    fn not_active(&self, state: ModuleState) -> RegisterError {
        RegisterError::ModuleNotActive {
            name: self.name.to_string(),
            state,
        }
    }
}

impl std::fmt::Debug for ModuleApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleApi").field("module", &self.name).finish()
    }
}
