use std::sync::Arc;

use scriptling_events::Payload;
use scriptling_host::{ChatCriteria, Filter, FnSource, ModuleMetadata, ModuleSource, TriggerOptions};
use tracing::info;

/// Logs incoming chat and outgoing messages, and calls out party chat
pub fn chat_logger() -> Arc<dyn ModuleSource> {
    let metadata = ModuleMetadata::new("chat_logger")
        .with_version("1.0.0")
        .with_description("Logs chat traffic");

    FnSource::new(metadata, |api| {
        api.on(
            "chat",
            |ctx, _inv| {
                if let Some(chat) = ctx.payload().chat() {
                    info!(target: "scripting", "[chat_logger] <- {}", chat.message);
                }
                Ok(())
            },
            TriggerOptions::new(),
        )?;

        api.on(
            "chat",
            |_ctx, inv| {
                info!(
                    target: "scripting",
                    "[chat_logger] party message from {}: {}",
                    inv.captures[0],
                    inv.captures[1]
                );
                Ok(())
            },
            TriggerOptions::new().with_filter(Filter::Chat(ChatCriteria::pattern(
                "[Party] ${player}: ${message}",
            ))),
        )?;

        api.on(
            "messageSent",
            |ctx, _inv| {
                if let Payload::MessageSent(sent) = ctx.payload() {
                    info!(target: "scripting", "[chat_logger] -> {}", sent.message);
                }
                Ok(())
            },
            TriggerOptions::new(),
        )?;

        Ok(())
    })
    .into_source()
}
