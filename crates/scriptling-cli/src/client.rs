//! A stand-in game client: produces the raw signals a real client's hook
//! points would see and translates them for the dispatch engine.

use scriptling_events::{
    ChatEvent, CommandEvent, DropItemEvent, EVENT_CONTRACT_VERSION, ItemRef, MessageSentEvent, Payload,
    ServerEvent, TickEvent, TooltipEvent,
};
use scriptling_host::HookAdapter;

/// What the client's interception points hand the host
#[derive(Debug, Clone, PartialEq)]
pub enum ClientSignal {
    Connected { address: String },
    Disconnected { address: String },
    WorldJoined,
    WorldLeft,
    Tick(u64),
    /// Raw chat packet, with `§` colour codes
    ChatReceived(String),
    ChatSent(String),
    /// A `/command` line the client handed to the host instead of the server
    CommandRun(String),
    TooltipShown { item: ItemRef, lines: Vec<String> },
    ItemDropped { item: ItemRef, whole_stack: bool },
}

#[derive(Debug, Default)]
pub struct SimulatedClient;

impl HookAdapter for SimulatedClient {
    type Signal = ClientSignal;

    fn contract_version(&self) -> u32 {
        EVENT_CONTRACT_VERSION
    }

    fn translate(&self, signal: ClientSignal) -> Payload {
        match signal {
            ClientSignal::Connected { address } => Payload::ServerConnect(ServerEvent { address }),
            ClientSignal::Disconnected { address } => {
                Payload::ServerDisconnect(ServerEvent { address })
            }
            ClientSignal::WorldJoined => Payload::WorldLoad,
            ClientSignal::WorldLeft => Payload::WorldUnload,
            ClientSignal::Tick(ticks) => Payload::Tick(TickEvent { ticks }),
            ClientSignal::ChatReceived(raw) => Payload::Chat(ChatEvent::formatted(raw)),
            ClientSignal::ChatSent(message) => Payload::MessageSent(MessageSentEvent { message }),
            ClientSignal::CommandRun(line) => Payload::Command(CommandEvent::parse(&line)),
            ClientSignal::TooltipShown { item, lines } => Payload::ItemTooltip(TooltipEvent {
                item,
                lines,
                advanced: false,
            }),
            ClientSignal::ItemDropped { item, whole_stack } => Payload::DropItem(DropItemEvent {
                item,
                entire_stack: whole_stack,
            }),
        }
    }
}

const SERVER: &str = "play.example.net:25565";

const CHAT_LINES: &[&str] = &[
    "§6[Server] §fWelcome to the lobby!",
    "§9[Party] §bAlex§f: meet at spawn",
    "§7Steve joined the game",
    "§a[Guild] §fhello everyone",
    "§c[Warning] §fserver restarting in 5 minutes",
    "§9[Party] §bAlex§f: ready when you are",
];

/// Scripted sequence of signals for a run of the simulated client
#[derive(Debug, Default)]
pub struct Session {
    chat_cursor: usize,
}

impl Session {
    pub fn opening(&self) -> Vec<ClientSignal> {
        vec![
            ClientSignal::Connected {
                address: SERVER.to_string(),
            },
            ClientSignal::WorldJoined,
        ]
    }

    /// Signals for one client tick
    pub fn tick(&mut self, tick: u64) -> Vec<ClientSignal> {
        let mut signals = vec![ClientSignal::Tick(tick)];

        if tick % 20 == 5 {
            let line = CHAT_LINES[self.chat_cursor % CHAT_LINES.len()];
            self.chat_cursor += 1;
            signals.push(ClientSignal::ChatReceived(line.to_string()));
        }
        if tick % 40 == 12 {
            signals.push(ClientSignal::TooltipShown {
                item: ItemRef::new("minecraft:diamond_sword", "Diamond Sword", 1),
                lines: vec!["Diamond Sword".to_string(), "+7 Attack Damage".to_string()],
            });
        }
        if tick % 50 == 30 {
            signals.push(ClientSignal::ItemDropped {
                item: ItemRef::new("minecraft:diamond", "Diamond", 12),
                whole_stack: tick % 100 == 30,
            });
        }
        if tick == 45 {
            signals.push(ClientSignal::ChatSent("/party accept".to_string()));
        }
        if tick == 60 {
            signals.push(ClientSignal::CommandRun("/ticks".to_string()));
        }

        signals
    }

    pub fn closing(&self) -> Vec<ClientSignal> {
        vec![
            ClientSignal::WorldLeft,
            ClientSignal::Disconnected {
                address: SERVER.to_string(),
            },
        ]
    }
}
