use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use scriptling_host::{Filter, FnSource, ModuleMetadata, ModuleSource, TriggerOptions};
use tracing::{debug, info};

const REPORT_EVERY: u64 = 100;

/// Counts ticks and reports every hundred
pub fn tick_counter() -> Arc<dyn ModuleSource> {
    let metadata = ModuleMetadata::new("tick_counter")
        .with_version("1.0.0")
        .with_description("Counts client ticks");

    FnSource::new(metadata, |api| {
        let seen = Arc::new(AtomicU64::new(0));

        api.on(
            "gameLoad",
            |_ctx, inv| {
                info!(target: "scripting", "[tick_counter] ready ({})", inv.api.module_info().version);
                Ok(())
            },
            TriggerOptions::new().once(),
        )?;

        let counter = seen.clone();
        api.on(
            "tick",
            move |_ctx, _inv| {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                if n % REPORT_EVERY == 0 {
                    info!(target: "scripting", "[tick_counter] {} ticks", n);
                }
                Ok(())
            },
            TriggerOptions::new(),
        )?;

        let counter = seen.clone();
        api.on(
            "command",
            move |_ctx, _inv| {
                info!(target: "scripting", "[tick_counter] {} ticks so far", counter.load(Ordering::Relaxed));
                Ok(())
            },
            TriggerOptions::new().with_filter(Filter::command(["ticks"])),
        )?;

        api.on(
            "gameUnload",
            move |_ctx, _inv| {
                debug!(target: "scripting", "[tick_counter] saw {} ticks in total", seen.load(Ordering::Relaxed));
                Ok(())
            },
            TriggerOptions::new(),
        )?;

        Ok(())
    })
    .into_source()
}
