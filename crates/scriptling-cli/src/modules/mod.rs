//! Modules compiled into the CLI host

mod chat_logger;
mod drop_guard;
mod tick_counter;

use std::sync::Arc;

use scriptling_host::ModuleSource;

pub use chat_logger::chat_logger;
pub use drop_guard::drop_guard;
pub use tick_counter::tick_counter;

/// Every built-in module, in no particular order; the entry pass sorts them
pub fn builtin() -> Vec<Arc<dyn ModuleSource>> {
    vec![chat_logger(), drop_guard(), tick_counter()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptling_events::{DropItemEvent, ItemRef, Payload, TooltipEvent};
    use scriptling_host::{DispatchConfig, init};

    #[test]
    fn test_builtin_modules_load() {
        let (mut engine, manager) = init(DispatchConfig::default());
        let report = manager.entry_pass(builtin()).join();
        assert_eq!(report.loaded, vec!["chat_logger", "drop_guard", "tick_counter"]);
        assert!(report.failed.is_empty());

        engine.pump();
        assert!(engine.recent_faults().next().is_none());
    }

    #[test]
    fn test_drop_guard_protects_whole_stacks() {
        let (mut engine, manager) = init(DispatchConfig::default());
        manager.load(drop_guard()).unwrap();

        let drop = |id: &str, whole: bool| {
            Payload::DropItem(DropItemEvent {
                item: ItemRef::new(id, id, 64),
                entire_stack: whole,
            })
        };
        assert!(engine.dispatch(drop("minecraft:diamond", true)).is_cancelled());
        assert!(!engine.dispatch(drop("minecraft:diamond", false)).is_cancelled());
        assert!(!engine.dispatch(drop("minecraft:dirt", true)).is_cancelled());

        let ctx = engine.dispatch(Payload::ItemTooltip(TooltipEvent {
            item: ItemRef::new("minecraft:emerald", "Emerald", 1),
            lines: vec!["Emerald".into()],
            advanced: false,
        }));
        match ctx.payload() {
            Payload::ItemTooltip(t) => assert_eq!(t.lines.last().unwrap(), "Protected by drop_guard"),
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
