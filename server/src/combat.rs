//! Firing, reloading, projectile travel and hit resolution.
//!
//! Invalid actions (firing while reloading, reloading a full magazine) are
//! silent no-ops; the client learns the outcome from the next snapshot.

use std::collections::BTreeMap;

use rand::Rng;
use shared::protocol::TileCoord;
use shared::{
    heading, HitZone, LootType, PlayerId, BASE_SPREAD, BODY_MULTIPLIER, BOT_BULLET_DAMAGE,
    BOT_HEAD_MULTIPLIER, FIRE_COOLDOWN_MS, HEAD_ZONE_MIN, HIT_BAND_TOP, HIT_RADIUS,
    HUMAN_BULLET_DAMAGE, HUMAN_HEAD_MULTIPLIER, LEG_ZONE_MAX, LOOT_HEALTH_AMOUNT,
    LOOT_PICKUP_RADIUS, LOOT_WEAPON_AMMO, MUZZLE_DISTANCE, MUZZLE_HEIGHT, PROJECTILE_LIFETIME_MS,
    PROJECTILE_SPEED, REGEN_PER_SECOND, REGEN_QUIET_MS, RELOAD_DURATION_MS, SLOW_DURATION_MS,
    WALL_HEIGHT,
};

use crate::entity::{LootBox, Player, Projectile};
use crate::world::{Arena, FloorGrid, WallDamage};

/// Where a shot is pointed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aim {
    /// Along the shooter's facing, perturbed by their stat-reduced spread.
    Facing,
    /// An explicit direction. Bots compute their own aim error.
    Directed { yaw: f32, pitch: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fired {
    pub projectile: Projectile,
    /// Yaw the projectile actually left the barrel at.
    pub angle: f32,
}

/// Attempts to fire one round. Returns `None` if the weapon is reloading,
/// empty or still cooling down. A bot pulling the trigger on an empty
/// magazine starts reloading instead.
pub fn try_fire<R: Rng>(
    player: &mut Player,
    aim: Aim,
    projectile_id: u64,
    now_ms: u64,
    rng: &mut R,
) -> Option<Fired> {
    if !player.alive || player.weapon.reloading {
        return None;
    }
    if player.weapon.ammo == 0 {
        if player.is_bot() {
            start_reload(player, now_ms);
        }
        return None;
    }
    if !player.weapon.cooled_down(now_ms, FIRE_COOLDOWN_MS) {
        return None;
    }

    player.weapon.ammo -= 1;
    player.weapon.last_shot = Some(now_ms);

    let (mx, my) = heading(player.angle);
    let x = player.x + mx * MUZZLE_DISTANCE;
    let y = player.y + my * MUZZLE_DISTANCE;

    let (yaw, pitch, z) = match aim {
        Aim::Facing => {
            let spread = BASE_SPREAD * player.stats.spread_multiplier();
            let yaw = player.angle + rng.gen_range(-1.0..=1.0) * spread;
            let pitch = player.pitch + rng.gen_range(-0.5..=0.5) * spread;
            let z = player.height + MUZZLE_HEIGHT + player.pitch.sin() * MUZZLE_DISTANCE;
            (yaw, pitch, z)
        }
        Aim::Directed { yaw, pitch } => (yaw, pitch, player.height + MUZZLE_HEIGHT),
    };
    let damage = if player.is_bot() {
        BOT_BULLET_DAMAGE
    } else {
        HUMAN_BULLET_DAMAGE
    };

    let speed = PROJECTILE_SPEED * player.stats.speed_multiplier();
    let (dx, dy) = heading(yaw);
    let projectile = Projectile {
        id: projectile_id,
        x,
        y,
        z,
        vx: dx * pitch.cos() * speed,
        vy: dy * pitch.cos() * speed,
        vz: pitch.sin() * speed,
        damage,
        owner: player.id,
        fired_by_bot: player.is_bot(),
        created_ms: now_ms,
    };

    if player.weapon.ammo == 0 {
        start_reload(player, now_ms);
    }

    Some(Fired {
        projectile,
        angle: yaw,
    })
}

/// Starts a reload unless one is running or the magazine is full.
pub fn start_reload(player: &mut Player, now_ms: u64) -> bool {
    if !player.alive || player.weapon.reloading || player.weapon.is_full() {
        return false;
    }
    player.weapon.reloading = true;
    player.weapon.reload_started = now_ms;
    true
}

/// Completes a running reload once its duration has elapsed. The magazine
/// refills to the current stat-derived capacity.
pub fn update_reload(player: &mut Player, now_ms: u64) -> bool {
    let weapon = &mut player.weapon;
    if !weapon.reloading || now_ms.saturating_sub(weapon.reload_started) < RELOAD_DURATION_MS {
        return false;
    }
    weapon.max_ammo = player.stats.max_ammo();
    weapon.ammo = weapon.max_ammo;
    weapon.reloading = false;
    true
}

/// Passive healing once the player has gone unhurt for the quiet period.
pub fn regenerate(player: &mut Player, dt: f32, now_ms: u64) {
    if !player.alive || player.health >= player.max_health {
        return;
    }
    let quiet = player
        .last_damage
        .map(|last| now_ms.saturating_sub(last) > REGEN_QUIET_MS)
        .unwrap_or(true);
    if quiet {
        player.health = (player.health + REGEN_PER_SECOND * dt).min(player.max_health);
    }
}

/// Zone hit at a height relative to the target's feet.
pub fn classify_hit(relative_height: f32) -> HitZone {
    if relative_height >= HEAD_ZONE_MIN {
        HitZone::Head
    } else if relative_height < LEG_ZONE_MAX {
        HitZone::Legs
    } else {
        HitZone::Body
    }
}

/// Damage multiplier for a zone. Bot head shots use a far smaller multiplier
/// than human ones.
pub fn zone_multiplier(zone: HitZone, fired_by_bot: bool) -> f32 {
    match zone {
        HitZone::Head if fired_by_bot => BOT_HEAD_MULTIPLIER,
        HitZone::Head => HUMAN_HEAD_MULTIPLIER,
        HitZone::Body | HitZone::Legs => BODY_MULTIPLIER,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileFate {
    Flying,
    /// Lifetime exceeded or left the arena.
    Expired,
    HitWall(WallDamage),
    HitFloor { destroyed: Option<TileCoord> },
    HitPlayer(PlayerId),
}

impl ProjectileFate {
    pub fn is_consumed(&self) -> bool {
        !matches!(self, ProjectileFate::Flying)
    }
}

/// Moves a projectile one step and resolves the first thing it hits, in
/// order: lifetime and bounds, wall volumes, the ground, then players.
pub fn step_projectile(
    projectile: &mut Projectile,
    arena: &mut Arena,
    floor: &mut FloorGrid,
    players: &BTreeMap<PlayerId, Player>,
    dt: f32,
    now_ms: u64,
) -> ProjectileFate {
    projectile.x += projectile.vx * dt;
    projectile.y += projectile.vy * dt;
    projectile.z += projectile.vz * dt;

    let out_of_bounds = projectile.x < 0.0
        || projectile.x > arena.width
        || projectile.y < 0.0
        || projectile.y > arena.height;
    let expired = now_ms.saturating_sub(projectile.created_ms) > PROJECTILE_LIFETIME_MS;
    if out_of_bounds || expired {
        return ProjectileFate::Expired;
    }

    if (0.0..=WALL_HEIGHT).contains(&projectile.z) {
        if let Some(index) = arena.wall_at(projectile.x, projectile.y) {
            return ProjectileFate::HitWall(arena.damage_wall(index));
        }
    }

    if projectile.z <= 0.0 {
        let destroyed = floor.damage(projectile.x, projectile.y, 1);
        return ProjectileFate::HitFloor { destroyed };
    }

    for player in players.values() {
        if player.id == projectile.owner || !player.alive {
            continue;
        }
        let dx = projectile.x - player.x;
        let dy = projectile.y - player.y;
        let relative_height = projectile.z - player.height;
        if (dx * dx + dy * dy).sqrt() < HIT_RADIUS
            && (0.0..=HIT_BAND_TOP).contains(&relative_height)
        {
            return ProjectileFate::HitPlayer(player.id);
        }
    }

    ProjectileFate::Flying
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub zone: HitZone,
    pub damage: f32,
    pub killed: bool,
}

/// Applies a projectile's damage to its victim. A killing hit marks the victim
/// dead, counts the death and ends their streak; crediting the shooter is up
/// to the caller.
pub fn apply_hit(victim: &mut Player, projectile: &Projectile, now_ms: u64) -> Hit {
    let zone = classify_hit(projectile.z - victim.height);
    if zone == HitZone::Legs {
        victim.slowed_until = now_ms + SLOW_DURATION_MS;
    }

    let damage = projectile.damage * zone_multiplier(zone, projectile.fired_by_bot);
    victim.health -= damage;
    victim.last_damage = Some(now_ms);

    let killed = victim.health <= 0.0;
    if killed {
        victim.health = 0.0;
        victim.alive = false;
        victim.deaths = victim.deaths.saturating_add(1);
        victim.kill_streak = 0;
    }

    Hit {
        zone,
        damage,
        killed,
    }
}

/// Collects a loot box if the player is standing on it.
pub fn try_pickup(player: &mut Player, loot: &mut LootBox) -> bool {
    if !player.alive || !loot.active {
        return false;
    }
    let dx = player.x - loot.x;
    let dy = player.y - loot.y;
    if (dx * dx + dy * dy).sqrt() >= LOOT_PICKUP_RADIUS {
        return false;
    }

    match loot.loot_type {
        LootType::Health => {
            player.health = (player.health + LOOT_HEALTH_AMOUNT).min(player.max_health);
        }
        LootType::Ammo => {
            player.weapon.ammo = player.weapon.max_ammo;
        }
        weapon_loot => {
            if let Some(kind) = weapon_loot.weapon() {
                player.weapon.kind = kind;
                player.weapon.ammo = LOOT_WEAPON_AMMO;
                player.weapon.max_ammo = LOOT_WEAPON_AMMO;
            }
        }
    }
    loot.active = false;
    true
}
