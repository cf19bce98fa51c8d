use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scriptling_events::Payload;
use scriptling_host::{
    DispatchEngine, HostConfig, Hooks, LoadPass, LoadReport, ModuleManager, ModuleScanner,
    ScriptRuntime, apply_scan, discover_modules, listen_for_sigusr2,
};
use tracing::{debug, info};

use crate::client::{ClientSignal, Session, SimulatedClient};
use crate::modules;
use crate::rules::RuleRuntime;

/// Client tick rate (20 ticks per second)
const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(config: HostConfig, ticks: Option<u64>, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let modules_dir = dir.unwrap_or_else(|| config.scripting.modules_dir());
    let runtime: Arc<dyn ScriptRuntime> = Arc::new(RuleRuntime);

    let (engine, manager) = scriptling_host::init(config.dispatch.clone());
    let mut hooks = Hooks::new(SimulatedClient, engine)?;

    let mut sources = modules::builtin();
    if config.scripting.enabled {
        info!(target: "modules", "Loading modules from {}", modules_dir.display());
        sources.extend(discover_modules(&modules_dir, runtime.clone(), &config.scripting));
    } else {
        info!(target: "modules", "Scripting disabled in config, loading built-in modules only");
    }

    let report = finish_pass(manager.entry_pass(sources)).await?;
    print_report(&report);
    // Fires gameLoad now the pass is done
    hooks.engine_mut().pump();

    let mut scanner = (config.scripting.enabled && config.scripting.hot_reload).then(|| {
        ModuleScanner::with_interval(
            modules_dir.clone(),
            Duration::from_millis(config.scripting.hot_reload_interval_ms),
        )
    });
    let mut reloads = listen_for_sigusr2();

    let mut session = Session::default();
    for signal in session.opening() {
        send(&mut hooks, signal);
    }

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut tick = 0u64;
    while ticks.is_none_or(|limit| tick < limit) {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
        }

        for signal in session.tick(tick) {
            send(&mut hooks, signal);
        }
        tick += 1;

        if reloads.take() {
            let report = finish_pass(manager.reload_all()).await?;
            print_report(&report);
            hooks.engine_mut().pump();
        }

        if let Some(scanner) = scanner.as_mut()
            && scanner.should_scan()
        {
            let scan = scanner.scan_changes();
            if scan.has_changes() {
                let summary = apply_scan(&manager, &scan, &runtime, &config.scripting);
                debug!(target: "modules", "Hot reload result: {:?}", summary);
            }
        }
    }

    for signal in session.closing() {
        send(&mut hooks, signal);
    }

    let mut engine = hooks.into_engine();
    print_diagnostics(&engine, &manager, tick);
    engine.shutdown(&manager);

    Ok(())
}

/// Wait for an entry pass without blocking the runtime, logging progress
async fn finish_pass(pass: LoadPass) -> anyhow::Result<LoadReport> {
    let mut progress = pass.progress();
    while progress.changed().await.is_ok() {
        let p = *progress.borrow_and_update();
        debug!(target: "modules", "Loading modules: {}/{} ({:.0}%)", p.done, p.total, p.fraction() * 100.0);
    }
    Ok(tokio::task::spawn_blocking(move || pass.join()).await?)
}

fn send(hooks: &mut Hooks<SimulatedClient>, signal: ClientSignal) {
    let ctx = hooks.signal(signal);
    if ctx.is_cancelled() {
        info!(target: "scripting", "Client suppressed {}", ctx.trigger_type());
    }
    if let Payload::ItemTooltip(tooltip) = ctx.payload() {
        debug!(target: "scripting", "Tooltip for {}: {:?}", tooltip.item.name, tooltip.lines);
    }
}

fn print_report(report: &LoadReport) {
    println!(
        "Loaded {} module(s): {}",
        report.loaded.len(),
        report.loaded.join(", ")
    );
    if !report.skipped.is_empty() {
        println!("Skipped library module(s): {}", report.skipped.join(", "));
    }
    for error in &report.failed {
        println!("  failed: {}", error);
    }
}

fn print_diagnostics(engine: &DispatchEngine, manager: &ModuleManager, ticks: u64) {
    println!();
    println!("Ran {} tick(s)", ticks);
    println!("{:<24} {:<10} {:<10} {:>8}", "MODULE", "VERSION", "STATE", "TRIGGERS");
    for module in manager.list_modules() {
        println!(
            "{:<24} {:<10} {:<10} {:>8}",
            module.name,
            module.version,
            module.state.to_string(),
            module.triggers
        );
        if let Some(error) = module.error {
            println!("    {}", error);
        }
    }

    let faults: Vec<_> = engine.recent_faults().collect();
    if !faults.is_empty() {
        println!();
        println!("Recent trigger faults:");
        for fault in faults {
            println!(
                "  {} {} {} ({}): {}",
                fault.at.format("%H:%M:%S"),
                fault.module,
                fault.trigger_type,
                fault.handle,
                fault.message
            );
        }
    }
}
