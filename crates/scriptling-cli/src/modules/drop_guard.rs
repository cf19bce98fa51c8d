use std::sync::Arc;

use scriptling_events::Payload;
use scriptling_host::{FnSource, ModuleMetadata, ModuleSource, Priority, TriggerOptions};
use tracing::warn;

/// Stops whole stacks of valuable items from being dropped
pub fn drop_guard() -> Arc<dyn ModuleSource> {
    let metadata = ModuleMetadata::new("drop_guard")
        .with_version("1.0.0")
        .with_description("Cancels whole-stack drops of protected items");

    FnSource::new(metadata, |api| {
        let protected = ["minecraft:diamond", "minecraft:emerald", "minecraft:netherite_ingot"];

        api.on(
            "dropItem",
            move |ctx, _inv| {
                let Payload::DropItem(dropped) = ctx.payload() else {
                    return Ok(());
                };
                if dropped.entire_stack && protected.contains(&dropped.item.id.as_str()) {
                    warn!(
                        target: "scripting",
                        "[drop_guard] refusing to drop {} x{}",
                        dropped.item.name,
                        dropped.item.count
                    );
                    ctx.cancel();
                }
                Ok(())
            },
            TriggerOptions::new().with_priority(Priority::HIGHEST),
        )?;

        api.on(
            "itemTooltip",
            move |ctx, _inv| {
                if let Payload::ItemTooltip(tooltip) = ctx.payload_mut()
                    && protected.contains(&tooltip.item.id.as_str())
                {
                    tooltip.lines.push("Protected by drop_guard".to_string());
                }
                Ok(())
            },
            TriggerOptions::new().with_priority(Priority::LOW),
        )?;

        Ok(())
    })
    .into_source()
}
