//! Mutable state for everything the tick simulates: players (human and bot),
//! projectiles and loot pickups.

use shared::protocol::{BulletData, LootBoxData};
use shared::{
    InputState, LootType, PlayerId, PlayerSnapshot, Stats, WeaponType, DASH_VISIBLE_MS,
};

pub const PLAYER_COLORS: [&str; 7] = [
    "#ff6b9d", "#4ecdc4", "#ffe66d", "#95e1d3", "#f38181", "#aa96da", "#fcbad3",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub kind: WeaponType,
    pub ammo: u32,
    pub max_ammo: u32,
    pub reloading: bool,
    pub reload_started: u64,
    /// `None` until the first shot so a fresh player can fire immediately.
    pub last_shot: Option<u64>,
}

impl Weapon {
    pub fn new(max_ammo: u32) -> Self {
        Self {
            kind: WeaponType::default(),
            ammo: max_ammo,
            max_ammo,
            reloading: false,
            reload_started: 0,
            last_shot: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.ammo >= self.max_ammo
    }

    /// True if at least `cooldown_ms` has passed since the last shot.
    pub fn cooled_down(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_shot
            .map(|last| now_ms.saturating_sub(last) >= cooldown_ms)
            .unwrap_or(true)
    }
}

/// Patrol memory carried by server-controlled players.
#[derive(Debug, Clone, PartialEq)]
pub struct BotBrain {
    pub patrol_heading: f32,
    /// Seconds until a new patrol heading is rolled.
    pub patrol_timer: f32,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub grounded: bool,
    pub angle: f32,
    pub pitch: f32,
    pub alive: bool,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub deaths: u32,
    pub xp: u32,
    pub level: u32,
    pub kill_streak: u32,
    pub best_streak: u32,
    pub skill_points: u32,
    pub stats: Stats,
    pub weapon: Weapon,
    pub slowed_until: u64,
    pub last_damage: Option<u64>,
    pub last_dash: Option<u64>,
    pub input: InputState,
    pub brain: Option<BotBrain>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: String, x: f32, y: f32) -> Self {
        let stats = Stats::default();
        Self {
            id,
            name,
            color,
            x,
            y,
            height: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            grounded: true,
            angle: 0.0,
            pitch: 0.0,
            alive: true,
            health: stats.max_health(),
            max_health: stats.max_health(),
            kills: 0,
            deaths: 0,
            xp: 0,
            level: 1,
            kill_streak: 0,
            best_streak: 0,
            skill_points: 0,
            stats,
            weapon: Weapon::new(stats.max_ammo()),
            slowed_until: 0,
            last_damage: None,
            last_dash: None,
            input: InputState::default(),
            brain: None,
        }
    }

    pub fn new_bot(
        id: PlayerId,
        name: String,
        color: String,
        x: f32,
        y: f32,
        heading: f32,
    ) -> Self {
        let mut bot = Self::new(id, name, color, x, y);
        bot.angle = heading;
        bot.brain = Some(BotBrain {
            patrol_heading: heading,
            patrol_timer: 0.0,
        });
        bot
    }

    pub fn is_bot(&self) -> bool {
        self.brain.is_some()
    }

    pub fn is_slowed(&self, now_ms: u64) -> bool {
        now_ms < self.slowed_until
    }

    pub fn is_dashing(&self, now_ms: u64) -> bool {
        self.last_dash
            .map(|last| now_ms.saturating_sub(last) < DASH_VISIBLE_MS)
            .unwrap_or(false)
    }

    /// Restores stat-derived health and ammo at a new position. Intent held
    /// at death is dropped; only the facing carries over.
    pub fn respawn_at(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.height = 0.0;
        self.vx = 0.0;
        self.vy = 0.0;
        self.vz = 0.0;
        self.grounded = true;
        self.max_health = self.stats.max_health();
        self.health = self.max_health;
        self.weapon.max_ammo = self.stats.max_ammo();
        self.weapon.ammo = self.weapon.max_ammo;
        self.weapon.reloading = false;
        self.slowed_until = 0;
        self.input = InputState {
            angle: self.angle,
            pitch: self.pitch,
            ..InputState::default()
        };
        self.alive = true;
    }

    pub fn snapshot(&self, now_ms: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            is_bot: self.is_bot(),
            name: self.name.clone(),
            color: self.color.clone(),
            x: self.x,
            y: self.y,
            height: self.height,
            angle: self.angle,
            pitch: self.pitch,
            health: self.health,
            max_health: self.max_health,
            alive: self.alive,
            grounded: self.grounded,
            kills: self.kills,
            deaths: self.deaths,
            weapon: self.weapon.kind,
            ammo: self.weapon.ammo,
            max_ammo: self.weapon.max_ammo,
            reloading: self.weapon.reloading,
            is_dashing: self.is_dashing(now_ms),
            is_slowed: self.is_slowed(now_ms),
            xp: self.xp,
            level: self.level,
            kill_streak: self.kill_streak,
            skill_points: self.skill_points,
            stats: self.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub damage: f32,
    pub owner: PlayerId,
    /// Whether the shooter was a bot when the shot left the barrel.
    pub fired_by_bot: bool,
    pub created_ms: u64,
}

impl Projectile {
    pub fn to_data(&self, angle: f32) -> BulletData {
        BulletData {
            id: self.id,
            x: self.x,
            y: self.y,
            z: self.z,
            vx: self.vx,
            vy: self.vy,
            vz: self.vz,
            angle,
            owner_id: self.owner,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LootBox {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub loot_type: LootType,
    pub active: bool,
}

impl LootBox {
    pub fn new(index: usize, x: f32, y: f32, loot_type: LootType) -> Self {
        Self {
            id: format!("lootbox_{}", index),
            x,
            y,
            loot_type,
            active: true,
        }
    }

    pub fn to_data(&self) -> LootBoxData {
        LootBoxData {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            loot_type: self.loot_type,
        }
    }
}
