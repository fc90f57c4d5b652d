//! Wire protocol types shared by the sync client and its tests.
//!
//! Every payload here is a full-replace snapshot or a fire-and-forget
//! action frame; nothing is diffed against prior state. Frames are
//! serialized with bincode on both directions of the socket.

use serde::{Deserialize, Serialize};

/// Minimum per-axis displacement before a movement frame is worth sending.
pub const POSITION_THRESHOLD: f32 = 0.1;

/// Cooldown between two special-action (steal/catch) emissions.
pub const SPECIAL_ACTION_COOLDOWN_MS: u64 = 500;

/// Bounded reconnection attempts after the transport drops.
pub const RECONNECT_ATTEMPTS: u8 = 3;

/// Fixed delay between reconnection attempts.
pub const RECONNECT_DELAY_MS: u64 = 1000;

/// Client tick period driving input sampling and transport polling.
pub const CLIENT_TICK_MS: u64 = 16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True when any single axis differs from `other` by more than `threshold`.
    pub fn exceeds_threshold(&self, other: &Vec3, threshold: f32) -> bool {
        (self.x - other.x).abs() > threshold
            || (self.y - other.y).abs() > threshold
            || (self.z - other.z).abs() > threshold
    }
}

/// Map pickup kinds, numbered as the server numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Boost = 1,
    Shield = 2,
    Thunder = 3,
    Gift = 4,
}

/// Remaining effect time of currently equipped items, in seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemDuration {
    pub boost: f32,
    pub shield: f32,
}

/// One player's entry inside a world snapshot.
///
/// Entirely replaced on every inbound `game.state`; the client never
/// patches individual fields of a previously received character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub char_type: u8,
    pub nick_name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub char_color: String,
    pub gift_cnt: u32,
    pub steal_motion: bool,
    pub stolen_motion: bool,
    pub protect_motion: u32,
    pub event_block: u32,
    pub is_skill_active: bool,
    pub total_skill_cooldown: f32,
    pub current_skill_cooldown: f32,
    pub speed: f32,
    pub items: Vec<ItemType>,
    pub item_duration: ItemDuration,
    pub thunder_effect: Vec<f32>,
    pub is_awaiting_teleport_ack: bool,
}

impl Character {
    pub fn new(id: impl Into<String>, char_type: u8) -> Self {
        Self {
            id: id.into(),
            char_type,
            nick_name: String::new(),
            position: Vec3::default(),
            velocity: Vec3::default(),
            char_color: String::new(),
            gift_cnt: 0,
            steal_motion: false,
            stolen_motion: false,
            protect_motion: 0,
            event_block: 0,
            is_skill_active: false,
            total_skill_cooldown: 0.0,
            current_skill_cooldown: 0.0,
            speed: 0.0,
            items: Vec::new(),
            item_duration: ItemDuration::default(),
            thunder_effect: Vec::new(),
            is_awaiting_teleport_ack: false,
        }
    }
}

/// Lobby occupancy pushed by the server while waiting for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: String,
    pub player_cnt: u32,
    pub state: String,
    pub max_player_cnt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameItem {
    pub id: String,
    pub item_type: ItemType,
    pub position: Vec3,
}

/// Authoritative world snapshot, produced atomically at the server tick rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub remain_running_time: f32,
    pub characters: Vec<Character>,
    pub map_items: Vec<GameItem>,
}

/// Outbound movement unit: the local character plus the special-action flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSample {
    pub character: Character,
    pub shift: bool,
}

/// Identity fields carried in steal-log broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillLogCharacter {
    pub user_id: String,
    pub nick_name: String,
    pub char_type: u8,
    pub char_color: String,
}

/// One steal broadcast once per occurrence; display-only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillLog {
    pub actor: KillLogCharacter,
    pub victim: KillLogCharacter,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillComboLog {
    pub actor: KillLogCharacter,
    pub combo_count: u32,
}

/// Frames the client sends. Variant names follow the wire event names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Connection-time credential: the local session identity.
    Connect { client_id: String },
    RoomEnter {
        char_type: u8,
        is_kem: bool,
    },
    RoomLaunchGame {
        char_type: u8,
        game_session_id: String,
        account_id: Option<String>,
    },
    RoomConfirm {
        user_id: String,
        char_type: u8,
        game_session_id: String,
    },
    RoomLeave,
    GameJoin { user_id: String },
    Move(MovementSample),
    Disconnect,
}

impl ClientEvent {
    /// Wire name of the event, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connect { .. } => "connect",
            ClientEvent::RoomEnter { .. } => "room.enter",
            ClientEvent::RoomLaunchGame { .. } => "room.launchGame",
            ClientEvent::RoomConfirm { .. } => "room.confirm",
            ClientEvent::RoomLeave => "room.leave",
            ClientEvent::GameJoin { .. } => "game.join",
            ClientEvent::Move(_) => "move",
            ClientEvent::Disconnect => "disconnect",
        }
    }
}

/// Frames the server pushes, including transport lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    Connected,
    Disconnected { reason: String },
    RoomChangeState(RoomInfo),
    RoomLaunchGameResponse {
        user_id: String,
        nick_name: String,
        is_guest: bool,
    },
    GameReady {
        user_id: String,
        char_type: u8,
        game_session_id: String,
    },
    GameStart,
    GameJoin { user_id: String },
    GameOver { room_id: String },
    GameState(GameSnapshot),
    StealLog(KillLog),
    StealComboLog(KillComboLog),
}

/// Subscription key: the discriminant of a [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    RoomChangeState,
    RoomLaunchGameResponse,
    GameReady,
    GameStart,
    GameJoin,
    GameOver,
    GameState,
    StealLog,
    StealComboLog,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Connected => EventKind::Connected,
            ServerEvent::Disconnected { .. } => EventKind::Disconnected,
            ServerEvent::RoomChangeState(_) => EventKind::RoomChangeState,
            ServerEvent::RoomLaunchGameResponse { .. } => EventKind::RoomLaunchGameResponse,
            ServerEvent::GameReady { .. } => EventKind::GameReady,
            ServerEvent::GameStart => EventKind::GameStart,
            ServerEvent::GameJoin { .. } => EventKind::GameJoin,
            ServerEvent::GameOver { .. } => EventKind::GameOver,
            ServerEvent::GameState(_) => EventKind::GameState,
            ServerEvent::StealLog(_) => EventKind::StealLog,
            ServerEvent::StealComboLog(_) => EventKind::StealComboLog,
        }
    }

    /// Wire name of the event, used in log lines.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            EventKind::Connected => "connect",
            EventKind::Disconnected => "disconnect",
            EventKind::RoomChangeState => "room.changeState",
            EventKind::RoomLaunchGameResponse => "room.launchGame.response",
            EventKind::GameReady => "game.ready",
            EventKind::GameStart => "game.start",
            EventKind::GameJoin => "game.join",
            EventKind::GameOver => "game.over",
            EventKind::GameState => "game.state",
            EventKind::StealLog => "game.log.steal",
            EventKind::StealComboLog => "game.log.steal-combo",
        }
    }
}
