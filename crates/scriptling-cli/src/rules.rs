//! Rule-file runtime for module folders.
//!
//! A module's entry file is TOML listing the triggers it registers:
//!
//! ```toml
//! [[on]]
//! event = "chat"
//! pattern = "[Party] ${who}: ${msg}"
//! actions = [{ do = "log", message = "party chat from {0}" }]
//!
//! [[on]]
//! event = "dropItem"
//! priority = -100
//! actions = [{ do = "cancel" }]
//! ```

use std::fs;

use anyhow::Context;
use scriptling_events::{EventContext, Payload};
use scriptling_host::{
    ChatCriteria, EntryPoint, Filter, Invocation, ModuleApi, ModuleFolder, ScriptRuntime,
    TriggerOptions,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "on")]
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
struct Rule {
    event: String,
    #[serde(default)]
    priority: i32,
    /// Chat pattern with `${name}` captures
    pattern: Option<String>,
    /// Chat text that must appear somewhere in the message
    contains: Option<String>,
    /// Sound id for `soundPlay` rules
    sound: Option<String>,
    /// Command name for `command` rules; `{0}`, `{1}`... expand to its arguments
    command: Option<String>,
    #[serde(default)]
    once: bool,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
enum Action {
    /// Log a message; `{0}`, `{1}`... expand to chat captures
    Log { message: String },
    Cancel,
    /// Append a line to an item tooltip
    Tooltip { line: String },
}

impl Rule {
    fn options(&self) -> TriggerOptions {
        let mut options = TriggerOptions::new().with_priority(self.priority);
        if self.once {
            options = options.once();
        }

        let chat = match (&self.pattern, &self.contains) {
            (Some(pattern), _) => Some(ChatCriteria::pattern(pattern)),
            (None, Some(contains)) => Some(ChatCriteria::new().contains(contains)),
            (None, None) => None,
        };
        if let Some(criteria) = chat {
            options = options.with_filter(Filter::Chat(criteria));
        } else if let Some(sound) = &self.sound {
            options = options.with_filter(Filter::SoundName(sound.clone()));
        } else if let Some(command) = &self.command {
            options = options.with_filter(Filter::command([command.clone()]));
        }
        options
    }
}

fn expand(message: &str, captures: &[String]) -> String {
    captures
        .iter()
        .enumerate()
        .fold(message.to_string(), |text, (i, capture)| {
            text.replace(&format!("{{{i}}}"), capture)
        })
}

fn run_actions(module: &str, actions: &[Action], ctx: &mut EventContext, inv: &Invocation<'_>) {
    for action in actions {
        match action {
            Action::Log { message } => {
                info!(target: "scripting", "[{}] {}", module, expand(message, inv.captures));
            }
            Action::Cancel => {
                ctx.cancel();
            }
            Action::Tooltip { line } => {
                if let Payload::ItemTooltip(tooltip) = ctx.payload_mut() {
                    tooltip.lines.push(expand(line, inv.captures));
                }
            }
        }
    }
}

/// Runs module folders whose entry file is a rule list
#[derive(Debug, Default)]
pub struct RuleRuntime;

impl ScriptRuntime for RuleRuntime {
    fn prepare(&self, module: &ModuleFolder) -> anyhow::Result<EntryPoint> {
        let path = module
            .entry_path()
            .with_context(|| format!("module {} has no entry file", module.metadata.name))?;
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let file: RuleFile =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let name = module.metadata.name.clone();

        Ok(Box::new(move |api: &ModuleApi| {
            for rule in file.rules {
                let options = rule.options();
                let module = name.clone();
                let actions = rule.actions;
                api.on(
                    &rule.event,
                    move |ctx, inv| {
                        run_actions(&module, &actions, ctx, inv);
                        Ok(())
                    },
                    options,
                )
                .with_context(|| format!("registering {} rule", rule.event))?;
            }
            Ok(())
        }))
    }
}
