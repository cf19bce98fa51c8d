use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, Weak};

use chrono::{DateTime, Utc};
use scriptling_events::{CancelPolicy, EventContext, Payload, TriggerType};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::api::ModuleApi;
use crate::error::{DispatchError, RegisterError, panic_message};
use crate::manager::{LoadReport, ModuleManager};
use crate::module::Module;
use crate::shared::{EngineCommand, Shared};
use crate::trigger::{Invocation, Priority, Trigger, TriggerHandle, TriggerOptions};

type IndexKey = (Priority, u64);

/// A callback that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFault {
    pub module: String,
    pub trigger_type: TriggerType,
    pub handle: TriggerHandle,
    pub message: String,
    pub panicked: bool,
    pub at: DateTime<Utc>,
}

/// Runs triggers for host events.
///
/// The engine lives on the dispatch thread and is the only writer of the
/// per-type trigger index. Registrations made elsewhere (module loaders,
/// callbacks) are queued and applied at the start and end of each dispatch.
pub struct DispatchEngine {
    shared: Arc<Shared>,
    commands: UnboundedReceiver<EngineCommand>,
    index: HashMap<TriggerType, BTreeMap<IndexKey, Weak<Trigger>>>,
    faults: VecDeque<TriggerFault>,
    pending_ready: Option<LoadReport>,
    last_report: Option<LoadReport>,
}

impl DispatchEngine {
    pub(crate) fn new(shared: Arc<Shared>, commands: UnboundedReceiver<EngineCommand>) -> Self {
        Self {
            shared,
            commands,
            index: HashMap::new(),
            faults: VecDeque::new(),
            pending_ready: None,
            last_report: None,
        }
    }

    /// Register a trigger on behalf of a module and index it immediately.
    pub fn register<F>(
        &mut self,
        api: &ModuleApi,
        trigger_type: TriggerType,
        callback: F,
        options: TriggerOptions,
    ) -> Result<TriggerHandle, RegisterError>
    where
        F: FnMut(&mut EventContext, &Invocation<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        let handle = api.on_type(trigger_type, callback, options)?;
        self.apply_pending();
        Ok(handle)
    }

    /// Remove a trigger by handle. Unknown handles are ignored.
    pub fn unregister(&mut self, handle: TriggerHandle) {
        if let Some(module) = self.shared.module_by_id(handle.module) {
            if module.release(handle.seq) {
                self.shared.mark_dirty();
            }
        }
        self.apply_pending();
    }

    /// Apply queued registrations and announce a finished entry pass.
    ///
    /// Hosts call this once per frame or tick so `gameLoad` fires even when
    /// no other event is being dispatched.
    pub fn pump(&mut self) {
        self.apply_pending();
        self.announce_ready();
    }

    /// Dispatch a host event to every matching trigger and return the
    /// resulting context.
    pub fn dispatch(&mut self, payload: Payload) -> EventContext {
        self.pump();
        let ctx = self.run(payload);
        self.apply_pending();
        ctx
    }

    /// Dispatch with the type given by name, as scripts do when they raise
    /// events themselves.
    pub fn dispatch_named(
        &mut self,
        type_name: &str,
        payload: Payload,
    ) -> Result<EventContext, DispatchError> {
        let expected = TriggerType::lookup(type_name)?;
        let actual = payload.trigger_type();
        if expected != actual {
            return Err(DispatchError::PayloadMismatch { expected, actual });
        }
        Ok(self.dispatch(payload))
    }

    /// Fire `worldUnload` and `gameUnload`, then unload every module.
    pub fn shutdown(&mut self, manager: &ModuleManager) {
        self.dispatch(Payload::WorldUnload);
        self.dispatch(Payload::GameUnload);
        manager.teardown();
        self.apply_pending();
        self.index.clear();
        info!(target: "dispatch", "Dispatch engine shut down");
    }

    /// Handles of the triggers indexed for a type, in dispatch order
    pub fn registered(&self, trigger_type: TriggerType) -> Vec<TriggerHandle> {
        self.index
            .get(&trigger_type)
            .map(|entries| {
                entries
                    .values()
                    .filter_map(Weak::upgrade)
                    .map(|t| t.handle())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn trigger_count(&self, trigger_type: TriggerType) -> usize {
        self.index
            .get(&trigger_type)
            .map(|entries| entries.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn recent_faults(&self) -> impl Iterator<Item = &TriggerFault> {
        self.faults.iter()
    }

    pub fn take_faults(&mut self) -> Vec<TriggerFault> {
        self.faults.drain(..).collect()
    }

    /// Report of the last completed entry pass
    pub fn last_load_report(&self) -> Option<&LoadReport> {
        self.last_report.as_ref()
    }

    fn announce_ready(&mut self) {
        if let Some(report) = self.pending_ready.take() {
            info!(
                target: "dispatch",
                "Modules ready ({} loaded, {} failed), firing gameLoad",
                report.loaded.len(),
                report.failed.len()
            );
            self.last_report = Some(report);
            self.run(Payload::GameLoad);
            self.apply_pending();
        }
    }

    fn run(&mut self, payload: Payload) -> EventContext {
        let mut ctx = EventContext::new(payload);
        let trigger_type = ctx.trigger_type();
        let policy = trigger_type.cancel_policy();

        let snapshot = self.snapshot(trigger_type);
        if snapshot.is_empty() {
            return ctx;
        }

        let mut expired: Vec<(Arc<Module>, u64)> = Vec::new();

        for (trigger, module) in &snapshot {
            if policy == CancelPolicy::StopPropagation && ctx.is_cancelled() {
                debug!(target: "dispatch", "{} cancelled, stopping propagation", trigger_type);
                break;
            }
            if policy == CancelPolicy::Flag && ctx.is_cancelled() && !trigger.runs_if_cancelled() {
                continue;
            }

            let captures = match trigger.filter() {
                None => Vec::new(),
                Some(filter) => {
                    match catch_unwind(AssertUnwindSafe(|| filter.matches(ctx.payload()))) {
                        Ok(Some(captures)) => captures,
                        Ok(None) => continue,
                        Err(panic) => {
                            self.record_fault(trigger, panic_message(panic.as_ref()), true);
                            continue;
                        }
                    }
                }
            };

            let api = ModuleApi::new(module, self.shared.clone());
            let invocation = Invocation {
                handle: trigger.handle(),
                captures: &captures,
                api: &api,
            };

            let before = ctx.payload().clone();
            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut callback = trigger
                    .callback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                (*callback)(&mut ctx, &invocation)
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.record_fault(trigger, format!("{:#}", e), false),
                Err(panic) => self.record_fault(trigger, panic_message(panic.as_ref()), true),
            }

            // Payloads may be edited but never swapped for another event type
            let replaced = ctx.payload().trigger_type();
            if replaced != trigger_type {
                *ctx.payload_mut() = before;
                self.record_fault(
                    trigger,
                    format!("replaced the {} payload with a {} payload", trigger_type, replaced),
                    false,
                );
            }

            if trigger.record_invocation() {
                expired.push((module.clone(), trigger.handle().seq));
            }
        }

        for (module, seq) in expired {
            if module.release(seq) {
                debug!(target: "dispatch", "Trigger {}#{} reached its invocation limit", module.id(), seq);
                self.shared.mark_dirty();
            }
        }

        ctx
    }

    /// Ordered live triggers for a type whose owners are Active.
    ///
    /// Taken under the module table's read lock so a concurrent reload is
    /// seen either entirely before or entirely after its swap.
    fn snapshot(&mut self, trigger_type: TriggerType) -> Vec<(Arc<Trigger>, Arc<Module>)> {
        let shared = self.shared.clone();
        let _table = shared.modules();
        self.drain_commands();

        let Some(entries) = self.index.get(&trigger_type) else {
            return Vec::new();
        };

        entries
            .values()
            .filter_map(|weak| {
                let trigger = weak.upgrade()?;
                if trigger.is_retired() || !trigger.is_enabled() {
                    return None;
                }
                let module = trigger.owner()?;
                module.is_active().then_some((trigger, module))
            })
            .collect()
    }

    fn apply_pending(&mut self) {
        self.drain_commands();
        if self.shared.take_dirty() {
            self.prune();
        }
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Insert {
                trigger_type,
                key,
                trigger,
            } => {
                if trigger.strong_count() > 0 {
                    self.index.entry(trigger_type).or_default().insert(key, trigger);
                }
            }
            EngineCommand::Rekey {
                trigger_type,
                old,
                new,
                trigger,
            } => {
                let entries = self.index.entry(trigger_type).or_default();
                entries.remove(&old);
                if trigger.strong_count() > 0 {
                    entries.insert(new, trigger);
                }
            }
            EngineCommand::ModulesReady(report) => {
                self.pending_ready = Some(report);
            }
        }
    }

    fn prune(&mut self) {
        let mut removed = 0;
        for entries in self.index.values_mut() {
            let before = entries.len();
            entries.retain(|_, weak| weak.upgrade().is_some_and(|t| !t.is_retired()));
            removed += before - entries.len();
        }
        self.index.retain(|_, entries| !entries.is_empty());
        if removed > 0 {
            debug!(target: "dispatch", "Pruned {} dead trigger(s) from the index", removed);
        }
    }

    fn record_fault(&mut self, trigger: &Trigger, message: String, panicked: bool) {
        error!(
            target: "dispatch",
            "Trigger {} ({}) in module {} {}: {}",
            trigger.handle(),
            trigger.trigger_type(),
            trigger.module_name(),
            if panicked { "panicked" } else { "failed" },
            message
        );

        let faults = trigger.record_fault();
        if let Some(max) = self.shared.config.max_faults {
            if faults >= max && trigger.is_enabled() {
                trigger.set_enabled(false);
                warn!(
                    target: "dispatch",
                    "Disabled trigger {} ({}) in module {} after {} fault(s)",
                    trigger.handle(),
                    trigger.trigger_type(),
                    trigger.module_name(),
                    faults
                );
            }
        }

        let capacity = self.shared.config.fault_log_capacity;
        if capacity == 0 {
            return;
        }
        while self.faults.len() >= capacity {
            self.faults.pop_front();
        }
        self.faults.push_back(TriggerFault {
            module: trigger.module_name().to_string(),
            trigger_type: trigger.trigger_type(),
            handle: trigger.handle(),
            message,
            panicked,
            at: Utc::now(),
        });
    }
}
