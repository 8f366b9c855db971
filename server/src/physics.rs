//! Movement, jumping, dashing and wall collision for players and bots.
//!
//! Planar motion resolves one axis at a time so entities slide along walls
//! instead of sticking to them. Anything at or above wall height ignores wall
//! footprints entirely and may land on top of them.

use shared::{
    heading, BASE_MOVE_SPEED, DASH_BOUNDS_MARGIN, DASH_COOLDOWN_MS, DASH_DISTANCE, DASH_STEPS,
    FALL_DEATH_HEIGHT, GRAVITY, JUMP_RELEASE_CAP, JUMP_VELOCITY, PLAYER_RADIUS, SLOW_MULTIPLIER,
    WALL_HEIGHT, WORLD_CLAMP_MARGIN,
};

use crate::entity::Player;
use crate::world::{Arena, FloorGrid};

/// What happened to an entity's footing during one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Moved,
    /// Dropped through a hole in the floor past the point of no return.
    FellOut,
}

/// Turns the latest intent into velocity, jump and dash.
///
/// Dash is consumed on use so a single input triggers at most one dash.
pub fn apply_intent(player: &mut Player, arena: &Arena, now_ms: u64) {
    if !player.alive {
        return;
    }

    let input = player.input;
    let speed = BASE_MOVE_SPEED * player.stats.speed_multiplier();
    let (mx, my) = input.movement();
    player.vx = mx * speed;
    player.vy = my * speed;

    if input.angle.is_finite() {
        player.angle = input.angle;
    }
    if input.pitch.is_finite() {
        player.pitch = input.pitch;
    }

    if input.jump && player.grounded {
        player.vz = JUMP_VELOCITY * player.stats.jump_multiplier();
        player.grounded = false;
    }

    // Variable jump height: letting go early trims the rest of the climb.
    if !input.jump && !player.grounded && player.vz > JUMP_RELEASE_CAP {
        player.vz = JUMP_RELEASE_CAP;
    }

    if input.dash {
        dash(player, arena, now_ms);
        player.input.dash = false;
    }
}

/// Instant repositioning along the movement intent, or along facing when
/// standing still. Returns false if the dash is still cooling down.
pub fn dash(player: &mut Player, arena: &Arena, now_ms: u64) -> bool {
    let ready = player
        .last_dash
        .map(|last| now_ms.saturating_sub(last) >= DASH_COOLDOWN_MS)
        .unwrap_or(true);
    if !ready {
        return false;
    }

    let distance = DASH_DISTANCE * player.stats.dash_multiplier();
    let (mx, my) = player.input.movement();
    let (dx, dy) = if mx == 0.0 && my == 0.0 {
        let (hx, hy) = heading(player.angle);
        (hx * distance, hy * distance)
    } else {
        (mx * distance, my * distance)
    };

    let step_x = dx / DASH_STEPS as f32;
    let step_y = dy / DASH_STEPS as f32;
    let elevated = player.height >= WALL_HEIGHT;

    for _ in 0..DASH_STEPS {
        let next_x = player.x + step_x;
        let next_y = player.y + step_y;
        let in_bounds = next_x > DASH_BOUNDS_MARGIN
            && next_x < arena.width - DASH_BOUNDS_MARGIN
            && next_y > DASH_BOUNDS_MARGIN
            && next_y < arena.height - DASH_BOUNDS_MARGIN;

        if !in_bounds || (!elevated && arena.collides(next_x, next_y, PLAYER_RADIUS)) {
            break;
        }
        player.x = next_x;
        player.y = next_y;
    }

    player.last_dash = Some(now_ms);
    true
}

/// Advances position and elevation by `dt` seconds against the current
/// geometry.
pub fn integrate(
    player: &mut Player,
    arena: &Arena,
    floor: &FloorGrid,
    dt: f32,
    now_ms: u64,
) -> Motion {
    if !player.alive {
        return Motion::Moved;
    }

    let slow = if player.is_slowed(now_ms) {
        SLOW_MULTIPLIER
    } else {
        1.0
    };
    let elevated = player.height >= WALL_HEIGHT;

    let next_x = player.x + player.vx * dt * slow;
    if elevated || !arena.collides(next_x, player.y, PLAYER_RADIUS) {
        player.x = next_x;
    }
    let next_y = player.y + player.vy * dt * slow;
    if elevated || !arena.collides(player.x, next_y, PLAYER_RADIUS) {
        player.y = next_y;
    }

    let over_wall = arena.collides(player.x, player.y, PLAYER_RADIUS);
    if !player.grounded || player.height > 0.0 {
        player.vz -= GRAVITY * dt;
        player.height += player.vz * dt;

        if over_wall && player.height <= WALL_HEIGHT && player.vz < 0.0 {
            player.height = WALL_HEIGHT;
            player.vz = 0.0;
            player.grounded = true;
        } else if !over_wall && player.height <= 0.0 && floor.supports(player.x, player.y) {
            player.height = 0.0;
            player.vz = 0.0;
            player.grounded = true;
        } else if !over_wall && player.height > 0.0 {
            // Walked off a wall top.
            player.grounded = false;
        }
    } else if !floor.supports(player.x, player.y) {
        player.grounded = false;
    }

    player.x = player
        .x
        .clamp(WORLD_CLAMP_MARGIN, arena.width - WORLD_CLAMP_MARGIN);
    player.y = player
        .y
        .clamp(WORLD_CLAMP_MARGIN, arena.height - WORLD_CLAMP_MARGIN);

    if player.height < FALL_DEATH_HEIGHT {
        return Motion::FellOut;
    }
    Motion::Moved
}
