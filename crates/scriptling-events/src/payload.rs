use serde::{Deserialize, Serialize};

use crate::trigger_type::TriggerType;

// ============================================================================
// Value objects
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Snapshot of an item stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Registry id, e.g. `minecraft:diamond_sword`
    pub id: String,
    /// Display name as shown to the player
    pub name: String,
    pub count: u32,
}

impl ItemRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            count,
        }
    }
}

/// Snapshot of an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i32,
    /// Host class of the entity, matched by class filters
    pub class_name: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: i32, class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            class_name: class_name.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntityRef {
    pub class_name: String,
    pub pos: BlockPos,
}

// ============================================================================
// Event payloads
// ============================================================================

/// A chat or action bar line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Text with formatting codes stripped
    pub message: String,
    /// Text with `&` formatting codes
    pub formatted: String,
}

impl ChatEvent {
    /// Build a chat event from plain text with no formatting.
    pub fn plain(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            formatted: message.clone(),
            message,
        }
    }

    /// Build a chat event from text carrying `&` or `§` formatting codes.
    pub fn formatted(formatted: impl Into<String>) -> Self {
        let formatted = formatted.into().replace('§', "&");
        Self {
            message: strip_formatting(&formatted),
            formatted,
        }
    }
}

/// Remove `&x` / `§x` formatting codes from a line of text.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '&' || c == '§')
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_hexdigit() || "klmnorKLMNOR".contains(*next))
        {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLineEvent {
    pub line_id: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    /// Ticks elapsed since the world was loaded
    pub ticks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub steps: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub x: f64,
    pub y: f64,
    pub button: i32,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollEvent {
    pub x: f64,
    pub y: f64,
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DragEvent {
    pub dx: f64,
    pub dy: f64,
    pub x: f64,
    pub y: f64,
    pub button: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenEvent {
    /// Class name of the screen
    pub screen: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSentEvent {
    /// Outgoing message; triggers may rewrite it
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TooltipEvent {
    pub item: ItemRef,
    /// Tooltip lines; triggers may rewrite them
    pub lines: Vec<String>,
    pub advanced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractAction {
    AttackEntity,
    UseEntity,
    UseBlock,
    UseItem,
    BreakBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractEvent {
    pub action: InteractAction,
    pub block: Option<BlockPos>,
    pub entity: Option<EntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuiKeyEvent {
    pub screen: String,
    pub key: i32,
    pub character: Option<char>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuiMouseEvent {
    pub screen: String,
    pub x: f64,
    pub y: f64,
    pub button: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuiDragEvent {
    pub screen: String,
    pub dx: f64,
    pub dy: f64,
    pub x: f64,
    pub y: f64,
    pub button: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuiRenderEvent {
    pub screen: String,
    pub mouse_x: i32,
    pub mouse_y: i32,
    pub partial_ticks: f32,
}

/// A network packet, identified by its class name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEvent {
    pub class_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropItemEvent {
    pub item: ItemRef,
    /// Whether the whole stack is being dropped
    pub entire_stack: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderEvent {
    pub partial_ticks: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockHighlightEvent {
    pub pos: BlockPos,
    pub partial_ticks: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderEntityEvent {
    pub entity: EntityRef,
    pub pos: Vec3,
    pub partial_ticks: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderBlockEntityEvent {
    pub block_entity: BlockEntityRef,
    pub partial_ticks: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundEvent {
    /// Sound id, e.g. `random.orb`
    pub name: String,
    pub pos: Vec3,
    pub volume: f32,
    pub pitch: f32,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleEvent {
    pub kind: String,
    pub pos: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDeathEvent {
    pub entity: EntityRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDamageEvent {
    pub entity: EntityRef,
    pub attacker: Option<EntityRef>,
}

/// A client-side command typed by the player, e.g. `/party invite Alex`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Command name without the leading slash
    pub name: String,
    pub args: Vec<String>,
}

impl CommandEvent {
    /// Split a typed command line into its name and arguments.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_start();
        let mut words = line.strip_prefix('/').unwrap_or(line).split_whitespace();
        Self {
            name: words.next().unwrap_or_default().to_string(),
            args: words.map(str::to_string).collect(),
        }
    }
}

/// The payload carried by one dispatch, one variant per [`TriggerType`].
///
/// Triggers receive the payload mutably; fields documented as rewritable are
/// read back by the hook adapter after the dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    Chat(ChatEvent),
    ActionBar(ChatEvent),
    ChatLineRemoved(ChatLineEvent),
    Tick(TickEvent),
    Step(StepEvent),
    GameLoad,
    GameUnload,
    Clicked(ClickEvent),
    Scrolled(ScrollEvent),
    Dragged(DragEvent),
    GuiOpened(ScreenEvent),
    GuiClosed(ScreenEvent),
    MessageSent(MessageSentEvent),
    ItemTooltip(TooltipEvent),
    PlayerInteract(InteractEvent),
    GuiKey(GuiKeyEvent),
    GuiMouseClick(GuiMouseEvent),
    GuiMouseDrag(GuiDragEvent),
    PacketSent(PacketEvent),
    PacketReceived(PacketEvent),
    ServerConnect(ServerEvent),
    ServerDisconnect(ServerEvent),
    DropItem(DropItemEvent),
    Command(CommandEvent),
    PreRenderWorld(RenderEvent),
    PostRenderWorld(RenderEvent),
    BlockHighlight(BlockHighlightEvent),
    RenderOverlay(RenderEvent),
    RenderPlayerList(RenderEvent),
    RenderEntity(RenderEntityEvent),
    RenderBlockEntity(RenderBlockEntityEvent),
    GuiRender(GuiRenderEvent),
    PostGuiRender(GuiRenderEvent),
    SoundPlay(SoundEvent),
    WorldLoad,
    WorldUnload,
    SpawnParticle(ParticleEvent),
    EntityDeath(EntityDeathEvent),
    EntityDamage(EntityDamageEvent),
}

impl Payload {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Payload::Chat(_) => TriggerType::Chat,
            Payload::ActionBar(_) => TriggerType::ActionBar,
            Payload::ChatLineRemoved(_) => TriggerType::ChatLineRemoved,
            Payload::Tick(_) => TriggerType::Tick,
            Payload::Step(_) => TriggerType::Step,
            Payload::GameLoad => TriggerType::GameLoad,
            Payload::GameUnload => TriggerType::GameUnload,
            Payload::Clicked(_) => TriggerType::Clicked,
            Payload::Scrolled(_) => TriggerType::Scrolled,
            Payload::Dragged(_) => TriggerType::Dragged,
            Payload::GuiOpened(_) => TriggerType::GuiOpened,
            Payload::GuiClosed(_) => TriggerType::GuiClosed,
            Payload::MessageSent(_) => TriggerType::MessageSent,
            Payload::ItemTooltip(_) => TriggerType::ItemTooltip,
            Payload::PlayerInteract(_) => TriggerType::PlayerInteract,
            Payload::GuiKey(_) => TriggerType::GuiKey,
            Payload::GuiMouseClick(_) => TriggerType::GuiMouseClick,
            Payload::GuiMouseDrag(_) => TriggerType::GuiMouseDrag,
            Payload::PacketSent(_) => TriggerType::PacketSent,
            Payload::PacketReceived(_) => TriggerType::PacketReceived,
            Payload::ServerConnect(_) => TriggerType::ServerConnect,
            Payload::ServerDisconnect(_) => TriggerType::ServerDisconnect,
            Payload::DropItem(_) => TriggerType::DropItem,
            Payload::Command(_) => TriggerType::Command,
            Payload::PreRenderWorld(_) => TriggerType::PreRenderWorld,
            Payload::PostRenderWorld(_) => TriggerType::PostRenderWorld,
            Payload::BlockHighlight(_) => TriggerType::BlockHighlight,
            Payload::RenderOverlay(_) => TriggerType::RenderOverlay,
            Payload::RenderPlayerList(_) => TriggerType::RenderPlayerList,
            Payload::RenderEntity(_) => TriggerType::RenderEntity,
            Payload::RenderBlockEntity(_) => TriggerType::RenderBlockEntity,
            Payload::GuiRender(_) => TriggerType::GuiRender,
            Payload::PostGuiRender(_) => TriggerType::PostGuiRender,
            Payload::SoundPlay(_) => TriggerType::SoundPlay,
            Payload::WorldLoad => TriggerType::WorldLoad,
            Payload::WorldUnload => TriggerType::WorldUnload,
            Payload::SpawnParticle(_) => TriggerType::SpawnParticle,
            Payload::EntityDeath(_) => TriggerType::EntityDeath,
            Payload::EntityDamage(_) => TriggerType::EntityDamage,
        }
    }

    /// The chat line carried by chat-like payloads
    pub fn chat(&self) -> Option<&ChatEvent> {
        match self {
            Payload::Chat(chat) | Payload::ActionBar(chat) => Some(chat),
            _ => None,
        }
    }

    /// Host class name of the object the event is about, for class filters
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Payload::RenderEntity(ev) => Some(&ev.entity.class_name),
            Payload::RenderBlockEntity(ev) => Some(&ev.block_entity.class_name),
            Payload::PacketSent(ev) | Payload::PacketReceived(ev) => Some(&ev.class_name),
            Payload::EntityDeath(ev) => Some(&ev.entity.class_name),
            Payload::EntityDamage(ev) => Some(&ev.entity.class_name),
            _ => None,
        }
    }
}
