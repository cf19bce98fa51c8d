//! Per-trigger filters evaluated before a callback runs.
//!
//! A filter that does not match skips the trigger without counting an
//! invocation. Filters are checked against the trigger type when the trigger
//! is registered, so a chat filter on a tick trigger is rejected up front.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use scriptling_events::{Payload, TriggerType};

use crate::error::RegisterError;

type PayloadPredicate = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;

/// Filter supplied with a registration
#[derive(Clone)]
pub enum Filter {
    /// Match chat text; see [`ChatCriteria`]
    Chat(ChatCriteria),
    /// Match a sound id, ignoring case
    SoundName(String),
    /// Match a command by name or alias, ignoring case and a leading `/`
    CommandNames(Vec<String>),
    /// Match the class of the entity, block entity or packet. An empty list
    /// matches everything.
    Classes(Vec<String>),
    /// Arbitrary test over the payload
    Predicate(PayloadPredicate),
}

impl Filter {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Payload) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Arc::new(f))
    }

    pub fn classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Classes(classes.into_iter().map(Into::into).collect())
    }

    pub fn command<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::CommandNames(names.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Chat(criteria) => f.debug_tuple("Chat").field(criteria).finish(),
            Filter::SoundName(name) => f.debug_tuple("SoundName").field(name).finish(),
            Filter::Classes(classes) => f.debug_tuple("Classes").field(classes).finish(),
            Filter::CommandNames(names) => f.debug_tuple("CommandNames").field(names).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Chat matching criteria.
///
/// Criteria text may contain `${name}` to capture a variable and `${*}` to
/// skip over any text. Captured variables are passed to the callback in the
/// order they appear. Everything else is matched literally. If the criteria
/// contain `&` or `§` formatting codes the formatted text is matched instead
/// of the plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCriteria {
    pattern: Option<String>,
    regex: Option<String>,
    starts_with: Option<String>,
    contains: Vec<String>,
    ends_with: Option<String>,
    case_insensitive: bool,
}

impl ChatCriteria {
    /// Empty criteria; matches every line
    pub fn new() -> Self {
        Self::default()
    }

    /// The whole line must match `criteria`
    pub fn pattern(criteria: impl Into<String>) -> Self {
        Self {
            pattern: Some(criteria.into()),
            ..Default::default()
        }
    }

    /// The whole line must match a raw regular expression. Capture groups
    /// become the callback's variables.
    pub fn regex(regex: impl Into<String>) -> Self {
        Self {
            regex: Some(regex.into()),
            ..Default::default()
        }
    }

    pub fn starts_with(mut self, criteria: impl Into<String>) -> Self {
        self.starts_with = Some(criteria.into());
        self
    }

    /// May be given several times; every part must be present
    pub fn contains(mut self, criteria: impl Into<String>) -> Self {
        self.contains.push(criteria.into());
        self
    }

    pub fn ends_with(mut self, criteria: impl Into<String>) -> Self {
        self.ends_with = Some(criteria.into());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    fn compile(&self) -> Result<CompiledChat, String> {
        let whole = self.pattern.is_some() as u8 + self.regex.is_some() as u8;
        let partial = self.starts_with.is_some() || self.ends_with.is_some() || !self.contains.is_empty();
        if whole > 1 || (whole == 1 && partial) {
            return Err("a full pattern cannot be combined with other criteria".to_string());
        }

        let flags = if self.case_insensitive { "(?is)" } else { "(?s)" };
        let mut parts = Vec::new();
        let mut formatted = false;

        if let Some(regex) = &self.regex {
            parts.push(format!("{flags}^(?:{regex})$"));
        }
        if let Some(pattern) = &self.pattern {
            formatted |= has_formatting(pattern);
            parts.push(format!("{flags}^{}$", criteria_to_regex(pattern)));
        }
        if let Some(start) = &self.starts_with {
            formatted |= has_formatting(start);
            parts.push(format!("{flags}^{}", criteria_to_regex(start)));
        }
        for contains in &self.contains {
            formatted |= has_formatting(contains);
            parts.push(format!("{flags}{}", criteria_to_regex(contains)));
        }
        if let Some(end) = &self.ends_with {
            formatted |= has_formatting(end);
            parts.push(format!("{flags}{}$", criteria_to_regex(end)));
        }

        let regexes = parts
            .iter()
            .map(|p| Regex::new(p).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledChat { regexes, formatted })
    }
}

fn has_formatting(criteria: &str) -> bool {
    criteria.contains('&') || criteria.contains('§')
}

/// Turn `${var}` / `${*}` criteria into a regular expression, escaping the
/// literal text around them. `${}` is a wildcard like `${*}`.
fn criteria_to_regex(criteria: &str) -> String {
    let criteria = criteria.replace('§', "&");
    let mut out = String::new();
    let mut rest = criteria.as_str();

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&regex::escape(&rest[..start]));
        let name = &rest[start + 2..start + len];
        if name.is_empty() || name == "*" {
            out.push_str("(?:.+?)");
        } else {
            out.push_str("(.+?)");
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(&regex::escape(rest));
    out
}

#[derive(Debug)]
pub(crate) struct CompiledChat {
    regexes: Vec<Regex>,
    formatted: bool,
}

impl CompiledChat {
    fn matches(&self, plain: &str, formatted: &str) -> Option<Vec<String>> {
        let text = if self.formatted { formatted } else { plain };
        let mut captures = Vec::new();
        for regex in &self.regexes {
            let caps = regex.captures(text)?;
            captures.extend(
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default()),
            );
        }
        Some(captures)
    }
}

/// A filter validated against its trigger type
pub(crate) enum CompiledFilter {
    Chat(CompiledChat),
    SoundName(String),
    Classes(Vec<String>),
    CommandNames(Vec<String>),
    Predicate(PayloadPredicate),
}

impl CompiledFilter {
    pub(crate) fn compile(filter: Filter, trigger_type: TriggerType) -> Result<Self, RegisterError> {
        let invalid = |reason: String| RegisterError::InvalidFilter {
            trigger_type,
            reason,
        };

        match filter {
            Filter::Chat(criteria) => {
                if !matches!(
                    trigger_type,
                    TriggerType::Chat | TriggerType::ActionBar | TriggerType::MessageSent
                ) {
                    return Err(invalid("chat criteria only apply to chat triggers".into()));
                }
                criteria.compile().map(CompiledFilter::Chat).map_err(invalid)
            }
            Filter::SoundName(name) => {
                if trigger_type != TriggerType::SoundPlay {
                    return Err(invalid("sound names only apply to soundPlay".into()));
                }
                Ok(CompiledFilter::SoundName(name.to_lowercase()))
            }
            Filter::Classes(classes) => {
                if !matches!(
                    trigger_type,
                    TriggerType::RenderEntity
                        | TriggerType::RenderBlockEntity
                        | TriggerType::PacketSent
                        | TriggerType::PacketReceived
                        | TriggerType::EntityDeath
                        | TriggerType::EntityDamage
                ) {
                    return Err(invalid("class filters need an entity or packet trigger".into()));
                }
                Ok(CompiledFilter::Classes(classes))
            }
            Filter::CommandNames(names) => {
                if trigger_type != TriggerType::Command {
                    return Err(invalid("command names only apply to command".into()));
                }
                let names: Vec<String> = names
                    .iter()
                    .map(|n| n.trim().trim_start_matches('/').to_lowercase())
                    .collect();
                let malformed = |n: &String| n.is_empty() || n.contains(char::is_whitespace);
                if names.is_empty() || names.iter().any(malformed) {
                    return Err(invalid("command names must be single non-empty words".into()));
                }
                Ok(CompiledFilter::CommandNames(names))
            }
            Filter::Predicate(predicate) => Ok(CompiledFilter::Predicate(predicate)),
        }
    }

    /// `Some(captures)` when the payload passes. Captures come from chat
    /// criteria, or are the arguments of a matched command.
    pub(crate) fn matches(&self, payload: &Payload) -> Option<Vec<String>> {
        match self {
            CompiledFilter::Chat(chat) => match payload {
                Payload::Chat(ev) | Payload::ActionBar(ev) => chat.matches(&ev.message, &ev.formatted),
                Payload::MessageSent(ev) => chat.matches(&ev.message, &ev.message),
                _ => None,
            },
            CompiledFilter::SoundName(name) => match payload {
                Payload::SoundPlay(ev) if ev.name.to_lowercase() == *name => Some(Vec::new()),
                _ => None,
            },
            CompiledFilter::Classes(classes) => {
                if classes.is_empty() {
                    return Some(Vec::new());
                }
                let class_name = payload.class_name()?;
                let simple = class_name.rsplit(['.', '$']).next().unwrap_or(class_name);
                classes
                    .iter()
                    .any(|c| c == class_name || c == simple)
                    .then(Vec::new)
            }
            CompiledFilter::CommandNames(names) => match payload {
                Payload::Command(ev) if names.contains(&ev.name.to_lowercase()) => {
                    Some(ev.args.clone())
                }
                _ => None,
            },
            CompiledFilter::Predicate(predicate) => predicate(payload).then(Vec::new),
        }
    }
}
