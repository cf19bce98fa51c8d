use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use scriptling_events::{EventContext, TriggerType};
use serde::{Deserialize, Serialize};

use crate::api::ModuleApi;
use crate::filter::{CompiledFilter, Filter};
use crate::module::{Module, ModuleId};

/// Ordering key of a trigger within its type. Lower values run first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(-200);
    pub const HIGH: Priority = Priority(-100);
    pub const NORMAL: Priority = Priority(0);
    pub const LOW: Priority = Priority(100);
    pub const LOWEST: Priority = Priority(200);
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies one registration: the module instance that made it and the
/// global registration sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerHandle {
    pub module: ModuleId,
    pub seq: u64,
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module, self.seq)
    }
}

/// Registration options
#[derive(Debug, Clone)]
pub struct TriggerOptions {
    pub(crate) priority: Priority,
    pub(crate) filter: Option<Filter>,
    pub(crate) max_invocations: Option<u32>,
    pub(crate) run_if_cancelled: bool,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            priority: Priority::NORMAL,
            filter: None,
            max_invocations: None,
            run_if_cancelled: true,
        }
    }
}

impl TriggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Remove the trigger after its first invocation
    pub fn once(self) -> Self {
        self.max_invocations(1)
    }

    pub fn max_invocations(mut self, n: u32) -> Self {
        self.max_invocations = Some(n);
        self
    }

    /// Whether to run when an earlier trigger already cancelled a flag-policy
    /// event (default: true)
    pub fn run_if_cancelled(mut self, run: bool) -> Self {
        self.run_if_cancelled = run;
        self
    }
}

/// What a callback sees besides the event context
pub struct Invocation<'a> {
    pub handle: TriggerHandle,
    /// Variables captured by chat criteria in order, or a command's arguments
    pub captures: &'a [String],
    /// Registration capability of the owning module
    pub api: &'a ModuleApi,
}

pub type Callback =
    Box<dyn FnMut(&mut EventContext, &Invocation<'_>) -> anyhow::Result<()> + Send + 'static>;

/// A single listener registration.
///
/// Owned by its module; the dispatch index only keeps a weak reference.
pub struct Trigger {
    handle: TriggerHandle,
    trigger_type: TriggerType,
    priority: AtomicI32,
    filter: Option<CompiledFilter>,
    max_invocations: Option<u32>,
    run_if_cancelled: bool,
    invocations: AtomicU32,
    faults: AtomicU32,
    enabled: AtomicBool,
    retired: AtomicBool,
    module_name: Arc<str>,
    owner: Weak<Module>,
    pub(crate) callback: Mutex<Callback>,
}

impl Trigger {
    pub(crate) fn new(
        handle: TriggerHandle,
        trigger_type: TriggerType,
        options: TriggerOptions,
        filter: Option<CompiledFilter>,
        module_name: Arc<str>,
        owner: Weak<Module>,
        callback: Callback,
    ) -> Self {
        Self {
            handle,
            trigger_type,
            priority: AtomicI32::new(options.priority.0),
            filter,
            max_invocations: options.max_invocations,
            run_if_cancelled: options.run_if_cancelled,
            invocations: AtomicU32::new(0),
            faults: AtomicU32::new(0),
            enabled: AtomicBool::new(true),
            retired: AtomicBool::new(false),
            module_name,
            owner,
            callback: Mutex::new(callback),
        }
    }

    pub fn handle(&self) -> TriggerHandle {
        self.handle
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn priority(&self) -> Priority {
        Priority(self.priority.load(Ordering::Acquire))
    }

    pub(crate) fn set_priority(&self, priority: Priority) -> Priority {
        Priority(self.priority.swap(priority.0, Ordering::AcqRel))
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub(crate) fn owner(&self) -> Option<Arc<Module>> {
        self.owner.upgrade()
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::Acquire)
    }

    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn runs_if_cancelled(&self) -> bool {
        self.run_if_cancelled
    }

    pub(crate) fn filter(&self) -> Option<&CompiledFilter> {
        self.filter.as_ref()
    }

    /// Count an invocation. Returns true when the trigger has used up its
    /// allowance and must be removed.
    pub(crate) fn record_invocation(&self) -> bool {
        let count = self.invocations.fetch_add(1, Ordering::AcqRel) + 1;
        match self.max_invocations {
            Some(max) if count >= max => {
                self.retire();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record_fault(&self) -> u32 {
        self.faults.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn info(&self) -> TriggerInfo {
        TriggerInfo {
            handle: self.handle,
            trigger_type: self.trigger_type,
            priority: self.priority(),
            invocations: self.invocations(),
            max_invocations: self.max_invocations,
            faults: self.faults(),
            enabled: self.is_enabled(),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("handle", &self.handle)
            .field("trigger_type", &self.trigger_type)
            .field("priority", &self.priority())
            .field("module", &self.module_name)
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}

/// Read-only view of a trigger for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInfo {
    pub handle: TriggerHandle,
    pub trigger_type: TriggerType,
    pub priority: Priority,
    pub invocations: u32,
    pub max_invocations: Option<u32>,
    pub faults: u32,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_levels_order() {
        let mut levels = vec![
            Priority::LOWEST,
            Priority::NORMAL,
            Priority::HIGHEST,
            Priority::LOW,
            Priority::HIGH,
        ];
        levels.sort();
        assert_eq!(
            levels,
            vec![
                Priority::HIGHEST,
                Priority::HIGH,
                Priority::NORMAL,
                Priority::LOW,
                Priority::LOWEST
            ]
        );
    }

    #[test]
    fn test_options_builder() {
        let options = TriggerOptions::new().with_priority(-5).once().run_if_cancelled(false);
        assert_eq!(options.priority, Priority(-5));
        assert_eq!(options.max_invocations, Some(1));
        assert!(!options.run_if_cancelled);
        assert!(TriggerOptions::default().run_if_cancelled);
    }

    #[test]
    fn test_handle_display() {
        let handle = TriggerHandle {
            module: ModuleId(3),
            seq: 17,
        };
        assert_eq!(handle.to_string(), "module-3#17");
    }
}
