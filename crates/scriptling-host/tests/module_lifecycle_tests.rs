// Integration tests for loading, unloading and reloading modules

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use common::{entries, host, log, push, source};
use scriptling_host::events::{Payload, TickEvent, TriggerType};
use scriptling_host::{
    FnSource, LoadError, ModuleMetadata, ModuleSource, ModuleState, RegisterError, TriggerOptions,
    UnloadError,
};

fn tick() -> Payload {
    Payload::Tick(TickEvent { ticks: 0 })
}

fn with_deps<F>(name: &str, requires: &[&str], entry: F) -> Arc<dyn ModuleSource>
where
    F: Fn(&scriptling_host::ModuleApi) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let metadata = requires
        .iter()
        .fold(ModuleMetadata::new(name), |m, dep| m.requires(*dep));
    FnSource::new(metadata, entry).into_source()
}

#[test]
fn test_unload_revokes_every_trigger() {
    let (mut engine, manager) = host();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    manager
        .load(source("busy", move |api| {
            for type_name in ["tick", "tick", "chat", "worldLoad"] {
                let c = c.clone();
                api.on(
                    type_name,
                    move |_ctx, _inv| {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    TriggerOptions::new(),
                )?;
            }
            Ok(())
        }))
        .unwrap();

    engine.dispatch(tick());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    manager.unload("busy").unwrap();
    engine.dispatch(tick());
    engine.dispatch(common::chat("hi"));
    engine.dispatch(Payload::WorldLoad);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    for ty in [TriggerType::Tick, TriggerType::Chat, TriggerType::WorldLoad] {
        assert_eq!(engine.trigger_count(ty), 0);
    }
    let module = manager.module("busy").unwrap();
    assert_eq!(module.state(), ModuleState::Unloaded);
    assert_eq!(module.trigger_count(), 0);
}

#[test]
fn test_unload_is_idempotent_and_unknown_names_fail() {
    let (_engine, manager) = host();
    manager.load(source("once", |_api| Ok(()))).unwrap();

    assert!(manager.unload("once").is_ok());
    assert!(manager.unload("once").is_ok());
    assert_eq!(
        manager.unload("never"),
        Err(UnloadError::NotFound("never".to_string()))
    );
}

#[test]
fn test_double_load_is_rejected_until_unloaded() {
    let (_engine, manager) = host();

    let first = manager.load(source("dup", |_api| Ok(()))).unwrap();
    assert_eq!(
        manager.load(source("dup", |_api| Ok(()))).unwrap_err(),
        LoadError::AlreadyLoaded {
            name: "dup".to_string()
        }
    );

    manager.unload("dup").unwrap();
    let second = manager.load(source("dup", |_api| Ok(()))).unwrap();
    assert_ne!(first.id(), second.id());
    assert!(second.is_active());
}

#[test]
fn test_failed_entry_rolls_back_registrations() {
    let (mut engine, manager) = host();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let err = manager
        .load(source("halfway", move |api| {
            for _ in 0..2 {
                let c = c.clone();
                api.on(
                    "tick",
                    move |_ctx, _inv| {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    TriggerOptions::new(),
                )?;
            }
            anyhow::bail!("config file missing")
        }))
        .unwrap_err();

    assert!(matches!(err, LoadError::EntryPoint { ref message, .. } if message == "config file missing"));
    engine.dispatch(tick());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.trigger_count(TriggerType::Tick), 0);

    let module = manager.module("halfway").unwrap();
    assert_eq!(module.state(), ModuleState::Errored);
    assert_eq!(module.trigger_count(), 0);
    assert!(module.error().unwrap().contains("config file missing"));
}

#[test]
fn test_panicking_entry_rolls_back_registrations() {
    let (mut engine, manager) = host();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let err = manager
        .load(source("explosive", move |api| {
            let c = c.clone();
            api.on(
                "tick",
                move |_ctx, _inv| {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                TriggerOptions::new(),
            )?;
            panic!("boom");
        }))
        .unwrap_err();

    assert_eq!(
        err,
        LoadError::Panicked {
            name: "explosive".to_string(),
            message: "boom".to_string()
        }
    );
    engine.dispatch(tick());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // An errored module can be loaded again
    assert!(manager.load(source("explosive", |_api| Ok(()))).is_ok());
}

#[test]
fn test_registration_after_unload_is_rejected() {
    let (_engine, manager) = host();
    let slot = Arc::new(std::sync::Mutex::new(None));

    let s = slot.clone();
    manager
        .load(source("leaky", move |api| {
            *s.lock().unwrap() = Some(api.clone());
            Ok(())
        }))
        .unwrap();
    manager.unload("leaky").unwrap();

    let api = slot.lock().unwrap().take().unwrap();
    let err = api
        .on("tick", |_ctx, _inv| Ok(()), TriggerOptions::new())
        .unwrap_err();
    assert_eq!(
        err,
        RegisterError::ModuleNotActive {
            name: "leaky".to_string(),
            state: ModuleState::Unloaded
        }
    );
}

#[test]
fn test_reload_replaces_triggers() {
    let (mut engine, manager) = host();
    let log = log();
    let generation = Arc::new(AtomicU32::new(0));

    let l = log.clone();
    let g = generation.clone();
    let first = manager
        .load(source("evolving", move |api| {
            let generation = g.fetch_add(1, Ordering::SeqCst) + 1;
            let l = l.clone();
            api.on(
                "tick",
                move |_ctx, _inv| {
                    push(&l, format!("gen{}", generation));
                    Ok(())
                },
                TriggerOptions::new(),
            )?;
            Ok(())
        }))
        .unwrap();

    engine.dispatch(tick());
    let second = manager.reload("evolving").unwrap();
    engine.dispatch(tick());

    assert_eq!(entries(&log), vec!["gen1", "gen2"]);
    assert_eq!(first.state(), ModuleState::Unloaded);
    assert!(second.is_active());
    assert_eq!(engine.trigger_count(TriggerType::Tick), 1);
    assert_eq!(
        manager.reload("ghost").unwrap_err(),
        LoadError::NotFound {
            name: "ghost".to_string()
        }
    );
}

#[test]
fn test_failed_reload_leaves_module_errored() {
    let (mut engine, manager) = host();
    let log = log();
    let attempts = Arc::new(AtomicU32::new(0));

    let l = log.clone();
    let a = attempts.clone();
    manager
        .load(source("fragile", move |api| {
            if a.fetch_add(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("syntax error");
            }
            let l = l.clone();
            api.on(
                "tick",
                move |_ctx, _inv| {
                    push(&l, "old");
                    Ok(())
                },
                TriggerOptions::new(),
            )?;
            Ok(())
        }))
        .unwrap();

    assert!(manager.reload("fragile").is_err());
    engine.dispatch(tick());

    assert!(entries(&log).is_empty());
    assert_eq!(manager.module("fragile").unwrap().state(), ModuleState::Errored);
}

#[test]
fn test_dispatch_never_sees_a_half_reloaded_module() {
    let (mut engine, manager) = host();
    let seen = log();
    let generation = Arc::new(AtomicU32::new(0));

    let s = seen.clone();
    let g = generation.clone();
    manager
        .load(source("churn", move |api| {
            let generation = g.fetch_add(1, Ordering::SeqCst);
            for _ in 0..3 {
                let s = s.clone();
                api.on(
                    "tick",
                    move |_ctx, _inv| {
                        push(&s, generation.to_string());
                        Ok(())
                    },
                    TriggerOptions::new(),
                )?;
            }
            Ok(())
        }))
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reloader = {
        let manager = manager.clone();
        let done = done.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                manager.reload("churn").unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut dispatches = 0;
    while !done.load(Ordering::SeqCst) || dispatches < 50 {
        engine.dispatch(tick());
        let batch = std::mem::take(&mut *seen.lock().unwrap());
        assert_eq!(batch.len(), 3, "dispatch saw {:?}", batch);
        assert!(batch.iter().all(|g| *g == batch[0]), "mixed generations {:?}", batch);
        dispatches += 1;
    }
    reloader.join().unwrap();
    assert_eq!(generation.load(Ordering::SeqCst), 201);
}

#[test]
fn test_list_modules_is_sorted_by_name() {
    let (_engine, manager) = host();
    for name in ["zeta", "alpha", "mid"] {
        manager.load(source(name, |_api| Ok(()))).unwrap();
    }
    manager.unload("mid").unwrap();

    let summaries = manager.list_modules();
    let names: Vec<_> = summaries.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    assert_eq!(summaries[1].state, ModuleState::Unloaded);
    assert_eq!(summaries[0].version, "1.0.0");
}

#[test]
fn test_entry_pass_orders_and_reports() {
    let (mut engine, manager) = host();
    let order = log();
    let game_loads = Arc::new(AtomicU32::new(0));

    let o = order.clone();
    let app = with_deps("app", &["core"], move |_api| {
        push(&o, "app");
        Ok(())
    });
    let o = order.clone();
    let gl = game_loads.clone();
    let core = with_deps("core", &[], move |api| {
        push(&o, "core");
        let gl = gl.clone();
        api.on(
            "gameLoad",
            move |_ctx, _inv| {
                gl.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            TriggerOptions::new(),
        )?;
        Ok(())
    });
    let broken = with_deps("broken", &["ghost"], |_api| Ok(()));
    let addon = with_deps("addon", &["broken"], |_api| Ok(()));
    let bad = with_deps("bad", &[], |_api| anyhow::bail!("nope"));
    let needs_bad = with_deps("needs-bad", &["BAD"], |_api| Ok(()));

    let pass = manager.entry_pass(vec![app, core, broken, addon, bad, needs_bad]);
    let progress = pass.progress();
    let report = pass.join();

    assert_eq!(entries(&order), vec!["core", "app"]);
    assert_eq!(report.loaded, vec!["core", "app"]);
    assert_eq!(
        report.failed,
        vec![
            LoadError::MissingDependency {
                name: "broken".into(),
                dependency: "ghost".into()
            },
            LoadError::DependencyFailed {
                name: "addon".into(),
                dependency: "broken".into()
            },
            LoadError::EntryPoint {
                name: "bad".into(),
                message: "nope".into()
            },
            LoadError::DependencyFailed {
                name: "needs-bad".into(),
                dependency: "BAD".into()
            },
        ]
    );
    let last = *progress.borrow();
    assert_eq!((last.done, last.total), (6, 6));
    assert_eq!(last.fraction(), 1.0);

    for name in ["broken", "addon", "bad", "needs-bad"] {
        assert_eq!(manager.module(name).unwrap().state(), ModuleState::Errored);
    }

    assert_eq!(game_loads.load(Ordering::SeqCst), 0);
    engine.pump();
    assert_eq!(game_loads.load(Ordering::SeqCst), 1);
    engine.pump();
    engine.dispatch(tick());
    assert_eq!(game_loads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.last_load_report(), Some(&report));
}

#[test]
fn test_entry_pass_rejects_cycles() {
    let (_engine, manager) = host();

    let report = manager
        .entry_pass(vec![
            with_deps("ping", &["pong"], |_api| Ok(())),
            with_deps("pong", &["ping"], |_api| Ok(())),
            with_deps("bystander", &[], |_api| Ok(())),
        ])
        .join();

    assert_eq!(report.loaded, vec!["bystander"]);
    assert_eq!(report.failed.len(), 2);
    assert!(
        report
            .failed
            .iter()
            .all(|e| matches!(e, LoadError::DependencyCycle { .. }))
    );
}

#[test]
fn test_reload_all_runs_a_fresh_pass() {
    let (mut engine, manager) = host();
    let loads = Arc::new(AtomicU32::new(0));
    let game_loads = Arc::new(AtomicU32::new(0));

    let l = loads.clone();
    let gl = game_loads.clone();
    let pass = manager.entry_pass(vec![source("counter", move |api| {
        l.fetch_add(1, Ordering::SeqCst);
        let gl = gl.clone();
        api.on(
            "gameLoad",
            move |_ctx, _inv| {
                gl.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            TriggerOptions::new(),
        )?;
        Ok(())
    })]);
    pass.join();
    engine.pump();

    let first = manager.module("counter").unwrap();
    let report = manager.reload_all().join();
    engine.pump();

    assert_eq!(report.loaded, vec!["counter"]);
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(game_loads.load(Ordering::SeqCst), 2);
    assert_eq!(first.state(), ModuleState::Unloaded);
    assert!(manager.module("counter").unwrap().is_active());
}

#[test]
fn test_shutdown_fires_unload_events_then_tears_down() {
    let (mut engine, manager) = host();
    let log = log();

    let l = log.clone();
    manager
        .load(source("tidy", move |api| {
            for type_name in ["worldUnload", "gameUnload"] {
                let l = l.clone();
                api.on(
                    type_name,
                    move |ctx, _inv| {
                        push(&l, ctx.trigger_type().name());
                        Ok(())
                    },
                    TriggerOptions::new(),
                )?;
            }
            Ok(())
        }))
        .unwrap();

    engine.shutdown(&manager);
    assert_eq!(entries(&log), vec!["worldUnload", "gameUnload"]);
    assert!(manager.list_modules().is_empty());
    assert!(manager.module("tidy").is_none());
}
