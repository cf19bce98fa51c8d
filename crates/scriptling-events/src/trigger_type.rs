use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Name passed to a lookup that is not part of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trigger type '{0}'")]
pub struct UnknownTriggerType(pub String);

/// What cancelling an event of a given type does to the rest of the dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelPolicy {
    /// Cancel requests are ignored and the flag stays false.
    NotCancellable,
    /// The flag is set and every remaining trigger still runs, except those
    /// registered with `run_if_cancelled(false)`.
    Flag,
    /// The flag is set and no trigger after the cancelling one runs.
    StopPropagation,
}

/// Coarse grouping of trigger types, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Client,
    Render,
    World,
}

/// Every event kind a module can subscribe to.
///
/// The catalog is closed: modules cannot add kinds at runtime. Names are the
/// camelCase form of the variant (`chat`, `worldLoad`, `renderEntity`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum TriggerType {
    // client
    Chat,
    ActionBar,
    ChatLineRemoved,
    Tick,
    Step,
    GameLoad,
    GameUnload,
    Clicked,
    Scrolled,
    Dragged,
    GuiOpened,
    GuiClosed,
    MessageSent,
    ItemTooltip,
    PlayerInteract,
    GuiKey,
    GuiMouseClick,
    GuiMouseDrag,
    PacketSent,
    PacketReceived,
    ServerConnect,
    ServerDisconnect,
    DropItem,
    Command,

    // render
    PreRenderWorld,
    PostRenderWorld,
    BlockHighlight,
    RenderOverlay,
    RenderPlayerList,
    RenderEntity,
    RenderBlockEntity,
    GuiRender,
    PostGuiRender,

    // world
    SoundPlay,
    WorldLoad,
    WorldUnload,
    SpawnParticle,
    EntityDeath,
    EntityDamage,
}

impl TriggerType {
    /// Resolve a trigger type from the name a module registered with.
    ///
    /// Matching ignores ASCII case and underscores, so `worldLoad`,
    /// `WORLD_LOAD` and `worldload` all resolve to [`TriggerType::WorldLoad`].
    pub fn lookup(name: &str) -> Result<Self, UnknownTriggerType> {
        let normalized: String = name.chars().filter(|c| *c != '_').collect();
        TriggerType::from_str(&normalized).map_err(|_| UnknownTriggerType(name.to_string()))
    }

    /// Canonical name of this type
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// All trigger types, in catalog order
    pub fn all() -> impl Iterator<Item = TriggerType> {
        TriggerType::iter()
    }

    pub fn category(self) -> Category {
        use TriggerType::*;
        match self {
            Chat | ActionBar | ChatLineRemoved | Tick | Step | GameLoad | GameUnload | Clicked
            | Scrolled | Dragged | GuiOpened | GuiClosed | MessageSent | ItemTooltip
            | PlayerInteract | GuiKey | GuiMouseClick | GuiMouseDrag | PacketSent
            | PacketReceived | ServerConnect | ServerDisconnect | DropItem | Command => {
                Category::Client
            }
            PreRenderWorld | PostRenderWorld | BlockHighlight | RenderOverlay
            | RenderPlayerList | RenderEntity | RenderBlockEntity | GuiRender | PostGuiRender => {
                Category::Render
            }
            SoundPlay | WorldLoad | WorldUnload | SpawnParticle | EntityDeath | EntityDamage => {
                Category::World
            }
        }
    }

    /// How a cancel request on this type affects the dispatch.
    ///
    /// Types whose cancellation suppresses an action before it happens (a chat
    /// line being shown, a packet being sent, an item being dropped, an input
    /// being handled) stop propagation. Types whose cancellation suppresses a
    /// render or a notification only set the flag, so observers later in the
    /// order still see the event.
    pub fn cancel_policy(self) -> CancelPolicy {
        use TriggerType::*;
        match self {
            Chat | ActionBar | MessageSent | PlayerInteract | GuiKey | GuiMouseClick
            | GuiMouseDrag | PacketSent | DropItem => CancelPolicy::StopPropagation,
            GuiOpened | ItemTooltip | PacketReceived | BlockHighlight | RenderPlayerList
            | RenderEntity | RenderBlockEntity | SoundPlay | SpawnParticle => CancelPolicy::Flag,
            ChatLineRemoved | Tick | Step | GameLoad | GameUnload | Clicked | Scrolled
            | Dragged | GuiClosed | ServerConnect | ServerDisconnect | PreRenderWorld
            | PostRenderWorld | RenderOverlay | GuiRender | PostGuiRender | WorldLoad
            | WorldUnload | EntityDeath | EntityDamage | Command => CancelPolicy::NotCancellable,
        }
    }

    pub fn cancellable(self) -> bool {
        self.cancel_policy() != CancelPolicy::NotCancellable
    }
}
