// Integration tests for hosts driving the engine through a hook adapter

mod common;

use common::{entries, host, log, push, source};
use scriptling_host::events::{
    ChatEvent, DropItemEvent, EVENT_CONTRACT_VERSION, ItemRef, Payload, TickEvent,
};
use scriptling_host::{ChatCriteria, Filter, HookAdapter, HookError, Hooks, TriggerOptions};

/// What a game client hands its hook points
enum ClientSignal {
    ChatPacket(String),
    ClientTick(u64),
    DropKey { item: &'static str, ctrl: bool },
}

struct ClientAdapter {
    version: u32,
}

impl HookAdapter for ClientAdapter {
    type Signal = ClientSignal;

    fn contract_version(&self) -> u32 {
        self.version
    }

    fn translate(&self, signal: ClientSignal) -> Payload {
        match signal {
            ClientSignal::ChatPacket(text) => Payload::Chat(ChatEvent::formatted(text)),
            ClientSignal::ClientTick(ticks) => Payload::Tick(TickEvent { ticks }),
            ClientSignal::DropKey { item, ctrl } => Payload::DropItem(DropItemEvent {
                item: ItemRef::new(item, item, 1),
                entire_stack: ctrl,
            }),
        }
    }
}

#[test]
fn test_mismatched_contract_is_refused() {
    let (engine, _manager) = host();
    let result = Hooks::new(
        ClientAdapter {
            version: EVENT_CONTRACT_VERSION + 1,
        },
        engine,
    );
    assert_eq!(
        result.err(),
        Some(HookError::ContractMismatch {
            expected: EVENT_CONTRACT_VERSION,
            found: EVENT_CONTRACT_VERSION + 1,
        })
    );
}

#[test]
fn test_signals_reach_triggers_and_cancel_back_to_host() {
    let (engine, manager) = host();
    let mut hooks = Hooks::new(
        ClientAdapter {
            version: EVENT_CONTRACT_VERSION,
        },
        engine,
    )
    .unwrap();
    let log = log();

    let l = log.clone();
    manager
        .load(source("client-scripts", move |api| {
            let chat = l.clone();
            api.on(
                "chat",
                move |ctx, inv| {
                    push(&chat, format!("chat {}", inv.captures[0]));
                    ctx.cancel();
                    Ok(())
                },
                TriggerOptions::new()
                    .with_filter(Filter::Chat(ChatCriteria::pattern("[Party] ${msg}"))),
            )?;
            let ticks = l.clone();
            api.on(
                "tick",
                move |ctx, _inv| {
                    if let Payload::Tick(t) = ctx.payload() {
                        push(&ticks, format!("tick {}", t.ticks));
                    }
                    Ok(())
                },
                TriggerOptions::new(),
            )?;
            api.on(
                "dropItem",
                |ctx, _inv| {
                    let whole_stack =
                        matches!(ctx.payload(), Payload::DropItem(ev) if ev.entire_stack);
                    if whole_stack {
                        ctx.cancel();
                    }
                    Ok(())
                },
                TriggerOptions::new(),
            )?;
            Ok(())
        }))
        .unwrap();

    // Colour codes are stripped before plain-text criteria are matched
    let ctx = hooks.signal(ClientSignal::ChatPacket("§9[Party] §fmeet at spawn".into()));
    assert!(ctx.is_cancelled());
    let ctx = hooks.signal(ClientSignal::ChatPacket("[Guild] hello".into()));
    assert!(!ctx.is_cancelled());

    hooks.signal(ClientSignal::ClientTick(42));

    let ctx = hooks.signal(ClientSignal::DropKey {
        item: "minecraft:dirt",
        ctrl: true,
    });
    assert!(ctx.is_cancelled());
    let ctx = hooks.signal(ClientSignal::DropKey {
        item: "minecraft:dirt",
        ctrl: false,
    });
    assert!(!ctx.is_cancelled());

    assert_eq!(entries(&log), vec!["chat meet at spawn", "tick 42"]);
    assert_eq!(hooks.adapter().version, EVENT_CONTRACT_VERSION);

    let mut engine = hooks.into_engine();
    engine.shutdown(&manager);
    assert!(manager.list_modules().is_empty());
}

#[test]
fn test_script_faults_never_reach_the_host() {
    let (engine, manager) = host();
    let mut hooks = Hooks::new(
        ClientAdapter {
            version: EVENT_CONTRACT_VERSION,
        },
        engine,
    )
    .unwrap();

    manager
        .load(source("broken", |api| {
            api.on(
                "tick",
                |_ctx, _inv| panic!("index out of bounds"),
                TriggerOptions::new(),
            )?;
            Ok(())
        }))
        .unwrap();

    let ctx = hooks.signal(ClientSignal::ClientTick(1));
    assert!(!ctx.is_cancelled());
    assert_eq!(hooks.engine().recent_faults().count(), 1);
    assert_eq!(hooks.engine_mut().take_faults()[0].module, "broken");
}
