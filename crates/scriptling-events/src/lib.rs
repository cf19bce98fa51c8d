/// Event catalog and payload types for scriptling
///
/// This crate holds the stable contract between the host and script modules:
/// the closed set of trigger types, the payload carried by each, and the
/// per-dispatch context triggers mutate. It has no knowledge of modules or
/// dispatch ordering; see `scriptling-host` for those.
pub mod context;
pub mod payload;
pub mod trigger_type;

pub use context::{EventContext, ReturnValue};
pub use payload::*;
pub use trigger_type::{CancelPolicy, Category, TriggerType, UnknownTriggerType};

/// Version of the payload contract described by this crate.
///
/// Bumped whenever a payload shape or a cancel policy changes, so hook
/// adapters written against an older contract are rejected at startup.
pub const EVENT_CONTRACT_VERSION: u32 = 1;
