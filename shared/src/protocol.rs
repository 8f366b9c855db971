//! Wire protocol between clients and the arena server.
//!
//! Every frame is a JSON object discriminated by its `type` field. Inbound
//! frames decode into [`ClientMessage`]; anything that does not match a
//! variant is rejected at the boundary. Outbound frames are built from
//! [`ServerMessage`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::stats::{Stat, Stats};

/// Stable identifier of a player or bot for the lifetime of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest movement/aim intent sent by a client. Not queued: a newer input
/// replaces the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub angle: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub jump: bool,
    #[serde(default)]
    pub dash: bool,
}

impl InputState {
    /// Movement vector with its magnitude clamped to 1.
    pub fn movement(&self) -> (f32, f32) {
        let x = if self.x.is_finite() { self.x } else { 0.0 };
        let y = if self.y.is_finite() { self.y } else { 0.0 };
        let magnitude = (x * x + y * y).sqrt();
        if magnitude > 1.0 {
            (x / magnitude, y / magnitude)
        } else {
            (x, y)
        }
    }
}

/// Progression loaded by an external save system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedProgress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kills: Option<u32>,
    #[serde(default)]
    pub deaths: Option<u32>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub xp: Option<u32>,
    #[serde(default)]
    pub skill_points: Option<u32>,
    #[serde(default)]
    pub skills: Option<Stats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        name: Option<String>,
    },
    Input {
        input: InputState,
    },
    Shoot {
        #[serde(default)]
        angle: Option<f32>,
    },
    Reload,
    /// The stat stays a raw string so an unknown name is a rejected action,
    /// not a malformed frame.
    AllocateStat {
        stat: String,
    },
    SyncStats {
        #[serde(default)]
        stats: SyncedProgress,
    },
    GetLeaderboard,
    Pong,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitZone {
    Head,
    Body,
    Legs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeaponType {
    #[default]
    Pistol,
    Revolver,
    Magnum,
    Derringer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LootType {
    Health,
    Revolver,
    Magnum,
    Derringer,
    Ammo,
}

impl LootType {
    pub const ALL: [LootType; 5] = [
        LootType::Health,
        LootType::Revolver,
        LootType::Magnum,
        LootType::Derringer,
        LootType::Ammo,
    ];

    /// Weapon granted by this pickup, if it is a weapon variant.
    pub fn weapon(&self) -> Option<WeaponType> {
        match self {
            LootType::Revolver => Some(WeaponType::Revolver),
            LootType::Magnum => Some(WeaponType::Magnum),
            LootType::Derringer => Some(WeaponType::Derringer),
            LootType::Health | LootType::Ammo => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub is_bot: bool,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub angle: f32,
    pub pitch: f32,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub grounded: bool,
    pub kills: u32,
    pub deaths: u32,
    pub weapon: WeaponType,
    pub ammo: u32,
    pub max_ammo: u32,
    pub reloading: bool,
    pub is_dashing: bool,
    pub is_slowed: bool,
    pub xp: u32,
    pub level: u32,
    pub kill_streak: u32,
    pub skill_points: u32,
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallData {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub is_edge: bool,
    pub is_destructible: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ad_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub health: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootBoxData {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub loot_type: LootType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCoord {
    pub gx: usize,
    pub gy: usize,
}

/// Static world description sent once on join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub width: f32,
    pub height: f32,
    pub walls: Vec<WallData>,
    pub loot_boxes: Vec<LootBoxData>,
    pub floor_tile_size: f32,
    pub floor_grid_size: usize,
    pub destroyed_tiles: Vec<TileCoord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletData {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub angle: f32,
    pub owner_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub name: String,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub points: u32,
    pub has_wallet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Welcome {
        player_id: PlayerId,
        map: MapData,
    },
    GameState {
        state: WorldSnapshot,
    },
    PlayerJoined {
        player: PlayerSnapshot,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerKilled {
        killer: PlayerSnapshot,
        victim: PlayerSnapshot,
        weapon: WeaponType,
        hit_zone: HitZone,
        xp_gain: u32,
        kill_streak: u32,
    },
    BulletFired {
        bullet: BulletData,
    },
    WallDestroyed {
        wall_id: String,
    },
    WallRegenerated {
        wall: WallData,
    },
    PlayerHit {
        damage: f32,
        hit_zone: HitZone,
    },
    HitConfirm {
        hit_zone: HitZone,
        damage: f32,
    },
    FloorTileDestroyed {
        gx: usize,
        gy: usize,
    },
    PlayerFell {
        player: PlayerSnapshot,
    },
    LevelUp {
        level: u32,
        skill_points: u32,
        new_points: u32,
    },
    StatAllocated {
        stat: Stat,
        new_value: u32,
        skill_points: u32,
        stats: Stats,
        max_health: f32,
        max_ammo: u32,
    },
    LootBoxPickup {
        box_id: String,
        player_id: PlayerId,
        loot_type: LootType,
    },
    LootBoxSpawn {
        #[serde(rename = "box")]
        loot_box: LootBoxData,
    },
    LeaderboardData {
        data: Vec<LeaderboardRow>,
    },
    Ping,
    Pong,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::GameState { .. } => "gameState",
            ServerMessage::PlayerJoined { .. } => "playerJoined",
            ServerMessage::PlayerLeft { .. } => "playerLeft",
            ServerMessage::PlayerKilled { .. } => "playerKilled",
            ServerMessage::BulletFired { .. } => "bulletFired",
            ServerMessage::WallDestroyed { .. } => "wallDestroyed",
            ServerMessage::WallRegenerated { .. } => "wallRegenerated",
            ServerMessage::PlayerHit { .. } => "playerHit",
            ServerMessage::HitConfirm { .. } => "hitConfirm",
            ServerMessage::FloorTileDestroyed { .. } => "floorTileDestroyed",
            ServerMessage::PlayerFell { .. } => "playerFell",
            ServerMessage::LevelUp { .. } => "levelUp",
            ServerMessage::StatAllocated { .. } => "statAllocated",
            ServerMessage::LootBoxPickup { .. } => "lootBoxPickup",
            ServerMessage::LootBoxSpawn { .. } => "lootBoxSpawn",
            ServerMessage::LeaderboardData { .. } => "leaderboardData",
            ServerMessage::Ping => "ping",
            ServerMessage::Pong => "pong",
        }
    }
}
