use serde::{Deserialize, Serialize};

pub mod protocol;
pub mod stats;

pub use protocol::{
    ClientMessage, HitZone, InputState, LootType, PlayerId, PlayerSnapshot, ServerMessage,
    WeaponType,
};
pub use stats::{Stat, Stats};

pub const TICK_RATE: u32 = 60;
/// Largest simulation step accepted in one tick, in seconds.
pub const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

pub const WORLD_WIDTH: f32 = 2000.0;
pub const WORLD_HEIGHT: f32 = 2000.0;
pub const WORLD_CLAMP_MARGIN: f32 = 50.0;

pub const PLAYER_RADIUS: f32 = 15.0;
pub const GRAVITY: f32 = 1200.0;
pub const BASE_MOVE_SPEED: f32 = 200.0;
pub const JUMP_VELOCITY: f32 = 400.0;
/// Upward velocity cap applied once jump is released mid-air.
pub const JUMP_RELEASE_CAP: f32 = 100.0;
pub const WALL_HEIGHT: f32 = 100.0;
pub const FALL_DEATH_HEIGHT: f32 = -200.0;

pub const DASH_DISTANCE: f32 = 200.0;
pub const DASH_COOLDOWN_MS: u64 = 800;
pub const DASH_STEPS: u32 = 10;
pub const DASH_BOUNDS_MARGIN: f32 = 20.0;
pub const DASH_VISIBLE_MS: u64 = 300;

pub const SLOW_MULTIPLIER: f32 = 0.5;
pub const SLOW_DURATION_MS: u64 = 2000;

pub const FIRE_COOLDOWN_MS: u64 = 300;
pub const MUZZLE_DISTANCE: f32 = 30.0;
pub const MUZZLE_HEIGHT: f32 = 25.0;
pub const BASE_SPREAD: f32 = 0.08;
pub const PROJECTILE_SPEED: f32 = 700.0;
pub const PROJECTILE_LIFETIME_MS: u64 = 2000;
pub const HUMAN_BULLET_DAMAGE: f32 = 25.0;
pub const BOT_BULLET_DAMAGE: f32 = 10.0;
pub const RELOAD_DURATION_MS: u64 = 1500;
pub const BASE_MAX_AMMO: u32 = 12;
pub const LOOT_WEAPON_AMMO: u32 = 6;

pub const HIT_RADIUS: f32 = 25.0;
pub const HIT_BAND_TOP: f32 = 50.0;
pub const HEAD_ZONE_MIN: f32 = 30.0;
pub const LEG_ZONE_MAX: f32 = 12.0;
/// Head multiplier when the shooter is human. Bots use [`BOT_HEAD_MULTIPLIER`]
/// so their lethality stays bounded.
pub const HUMAN_HEAD_MULTIPLIER: f32 = 40.0;
pub const BOT_HEAD_MULTIPLIER: f32 = 2.0;
pub const BODY_MULTIPLIER: f32 = 1.0;

pub const BASE_MAX_HEALTH: f32 = 100.0;
pub const RESPAWN_DELAY_MS: u64 = 3000;
pub const REGEN_QUIET_MS: u64 = 5000;
pub const REGEN_PER_SECOND: f32 = 5.0;

pub const WALL_CHUNK_SIZE: f32 = 40.0;
pub const WALL_CHUNK_HEALTH: u32 = 3;
pub const WALL_REGEN_MS: u64 = 30_000;

pub const FLOOR_TILE_SIZE: f32 = 40.0;
pub const FLOOR_GRID_SIZE: usize = 50;
pub const FLOOR_TILE_HEALTH: u32 = 5;

pub const LOOT_PICKUP_RADIUS: f32 = 30.0;
pub const LOOT_RESPAWN_MS: u64 = 30_000;
pub const LOOT_HEALTH_AMOUNT: f32 = 50.0;

pub const XP_PER_KILL: u32 = 100;
pub const XP_PER_STREAK_LEVEL: u32 = 50;
pub const XP_HEADSHOT_BONUS: u32 = 50;
pub const SKILL_POINTS_PER_LEVEL: u32 = 2;

pub const SPAWN_CLEARANCE: f32 = 40.0;
pub const SPAWN_ATTEMPTS: u32 = 50;

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if the point lies inside or on the border of the rectangle.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Point on the rectangle closest to (x, y).
    pub fn closest_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(self.x, self.x + self.width),
            y.clamp(self.y, self.y + self.height),
        )
    }
}

/// Circle vs rectangle overlap using the closest point on the rectangle.
/// Touching edges do not count as an intersection.
pub fn circle_intersects_rect(x: f32, y: f32, radius: f32, rect: &Rect) -> bool {
    let (cx, cy) = rect.closest_point(x, y);
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy < radius * radius
}

/// Wraps an angle difference into [-PI, PI].
pub fn wrap_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle < -PI {
        angle += PI * 2.0;
    }
    while angle > PI {
        angle -= PI * 2.0;
    }
    angle
}

/// Yaw convention shared with the client: 0 faces -y, PI/2 faces +x.
pub fn heading(angle: f32) -> (f32, f32) {
    (angle.sin(), -angle.cos())
}
