//! Decision loop for server-controlled players.
//!
//! Bots do not touch the world directly. Each tick they look at the current
//! positions of everyone else, write an [`InputState`] exactly like a client
//! would, and optionally ask to fire along a computed aim.

use std::f32::consts::PI;

use rand::Rng;
use shared::{heading, wrap_angle, InputState, PlayerId, MUZZLE_HEIGHT};

use crate::combat::Aim;
use crate::entity::Player;
use crate::world::Arena;

pub const BOT_NAMES: [&str; 6] = [
    "Applejack-Bot",
    "Rainbow-Bot",
    "Pinkie-Bot",
    "Flutter-Bot",
    "Rarity-Bot",
    "Twilight-Bot",
];

pub const DETECTION_RADIUS: f32 = 600.0;
pub const CLOSE_RANGE: f32 = 150.0;
/// Fraction of the remaining angle closed per second.
pub const TURN_RATE: f32 = 5.0;
pub const AIM_TOLERANCE: f32 = 0.2;
pub const FIRE_INTERVAL_MS: u64 = 800;
/// Chase and patrol speeds as fractions of base move speed (150 and 100).
pub const CHASE_INPUT: f32 = 0.75;
pub const PATROL_INPUT: f32 = 0.5;
const PATROL_SPEED: f32 = 100.0;
const PATROL_LOOKAHEAD: f32 = 0.1;
const PATROL_CLEARANCE_RADIUS: f32 = 20.0;

const HEAD_AIM_HEIGHT: f32 = 40.0;
const BODY_AIM_HEIGHT: f32 = 15.0;
const MIN_HEADSHOT_CHANCE: f32 = 0.05;
const HEADSHOT_CHANCE_RANGE: f32 = 0.2;
const YAW_NOISE: f32 = 0.075;
const PITCH_NOISE: f32 = 0.05;
const MIN_AIM_DISTANCE: f32 = 10.0;

/// Position of a potential target, captured before any bot moves this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub height: f32,
}

impl Target {
    pub fn of(player: &Player) -> Self {
        Self {
            id: player.id,
            x: player.x,
            y: player.y,
            height: player.height,
        }
    }
}

/// Nearest target strictly inside the detection radius, excluding `bot`.
pub fn nearest_target(bot: &Player, targets: &[Target]) -> Option<(Target, f32)> {
    targets
        .iter()
        .filter(|target| target.id != bot.id)
        .map(|target| {
            let dx = target.x - bot.x;
            let dy = target.y - bot.y;
            (*target, (dx * dx + dy * dy).sqrt())
        })
        .filter(|(_, distance)| *distance < DETECTION_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Writes this tick's intent for a bot. Returns an aim if the bot wants to
/// shoot; the caller still runs it through the normal fire checks.
pub fn steer<R: Rng>(
    bot: &mut Player,
    targets: &[Target],
    arena: &Arena,
    dt: f32,
    now_ms: u64,
    rng: &mut R,
) -> Option<Aim> {
    if !bot.alive {
        return None;
    }
    let target = nearest_target(bot, targets);
    let brain = bot.brain.as_mut()?;
    brain.patrol_timer -= dt;

    let Some((target, distance)) = target else {
        if brain.patrol_timer <= 0.0 {
            brain.patrol_heading = rng.gen_range(0.0..PI * 2.0);
            brain.patrol_timer = rng.gen_range(2.0..5.0);
        }
        let patrol_heading = brain.patrol_heading;
        let (hx, hy) = heading(patrol_heading);
        bot.input = InputState {
            x: hx * PATROL_INPUT,
            y: hy * PATROL_INPUT,
            angle: patrol_heading,
            ..InputState::default()
        };

        let ahead_x = bot.x + hx * PATROL_SPEED * PATROL_LOOKAHEAD;
        let ahead_y = bot.y + hy * PATROL_SPEED * PATROL_LOOKAHEAD;
        if arena.collides(ahead_x, ahead_y, PATROL_CLEARANCE_RADIUS) {
            brain.patrol_timer = 0.0;
        }
        return None;
    };

    let target_angle = (target.x - bot.x).atan2(-(target.y - bot.y));
    let diff = wrap_angle(target_angle - bot.angle);
    let angle = bot.angle + diff * dt * TURN_RATE;
    let (hx, hy) = heading(angle);
    let chase = if distance > CLOSE_RANGE { CHASE_INPUT } else { 0.0 };
    bot.input = InputState {
        x: hx * chase,
        y: hy * chase,
        angle,
        ..InputState::default()
    };

    if diff.abs() >= AIM_TOLERANCE || !bot.weapon.cooled_down(now_ms, FIRE_INTERVAL_MS) {
        return None;
    }

    let headshot_chance = MIN_HEADSHOT_CHANCE + rng.gen::<f32>() * HEADSHOT_CHANCE_RANGE;
    let aim_height = if rng.gen::<f32>() < headshot_chance {
        HEAD_AIM_HEIGHT
    } else {
        BODY_AIM_HEIGHT
    };
    let dz = target.height + aim_height - (bot.height + MUZZLE_HEIGHT);
    let pitch = dz.atan2(distance.max(MIN_AIM_DISTANCE));

    Some(Aim::Directed {
        yaw: angle + rng.gen_range(-YAW_NOISE..=YAW_NOISE),
        pitch: pitch + rng.gen_range(-PITCH_NOISE..=PITCH_NOISE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{WallChunk, WallKind};
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::Rect;

    const DT: f32 = 1.0 / 60.0;

    fn bot_at(x: f32, y: f32, angle: f32) -> Player {
        Player::new_bot(
            PlayerId(100),
            BOT_NAMES[0].to_string(),
            "#fff".to_string(),
            x,
            y,
            angle,
        )
    }

    fn target(id: u32, x: f32, y: f32) -> Target {
        Target {
            id: PlayerId(id),
            x,
            y,
            height: 0.0,
        }
    }

    #[test]
    fn test_nearest_target_within_radius() {
        let bot = bot_at(500.0, 500.0, 0.0);
        let targets = [
            Target::of(&bot),
            target(1, 900.0, 500.0),
            target(2, 500.0, 300.0),
            target(3, 1200.0, 500.0),
        ];
        let (found, distance) = nearest_target(&bot, &targets).unwrap();
        assert_eq!(found.id, PlayerId(2));
        assert_approx_eq!(distance, 200.0, 1e-3);

        assert!(nearest_target(&bot, &[target(3, 1200.0, 500.0)]).is_none());
    }

    #[test]
    fn test_turns_toward_and_chases_distant_target() {
        let arena = Arena::with_walls(Vec::new());
        let mut bot = bot_at(500.0, 500.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let aim = steer(
            &mut bot,
            &[target(1, 900.0, 500.0)],
            &arena,
            DT,
            0,
            &mut rng,
        );

        assert!(aim.is_none(), "should not fire while facing away");
        let expected = (PI / 2.0) * DT * TURN_RATE;
        assert_approx_eq!(bot.input.angle, expected, 1e-4);
        let (x, y) = bot.input.movement();
        assert_approx_eq!((x * x + y * y).sqrt(), CHASE_INPUT, 1e-4);
    }

    #[test]
    fn test_holds_position_at_close_range() {
        let arena = Arena::with_walls(Vec::new());
        let mut bot = bot_at(500.0, 500.0, 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        steer(&mut bot, &[target(1, 500.0, 400.0)], &arena, DT, 0, &mut rng);
        assert_eq!(bot.input.movement(), (0.0, 0.0));
    }

    #[test]
    fn test_fires_when_aligned_and_rested() {
        let arena = Arena::with_walls(Vec::new());
        let mut bot = bot_at(500.0, 500.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        let targets = [target(1, 500.0, 300.0)];

        let aim = steer(&mut bot, &targets, &arena, DT, 1000, &mut rng);
        match aim {
            Some(Aim::Directed { yaw, pitch }) => {
                assert!(yaw.abs() <= YAW_NOISE + 1e-6);
                assert!(pitch.abs() < 0.2);
            }
            other => panic!("Expected a directed shot, got {:?}", other),
        }

        bot.weapon.last_shot = Some(1000);
        assert!(steer(&mut bot, &targets, &arena, DT, 1500, &mut rng).is_none());
        assert!(steer(&mut bot, &targets, &arena, DT, 1800, &mut rng).is_some());
    }

    #[test]
    fn test_patrols_without_target() {
        let arena = Arena::with_walls(Vec::new());
        let mut bot = bot_at(500.0, 500.0, 0.0);
        let mut rng = StdRng::seed_from_u64(4);
        steer(&mut bot, &[], &arena, DT, 0, &mut rng);

        let brain = bot.brain.clone().unwrap();
        assert!(brain.patrol_timer >= 2.0 && brain.patrol_timer <= 5.0);
        assert_eq!(bot.input.angle, brain.patrol_heading);
        let (x, y) = bot.input.movement();
        assert_approx_eq!((x * x + y * y).sqrt(), PATROL_INPUT, 1e-4);
    }

    #[test]
    fn test_wall_ahead_resets_patrol_timer() {
        let arena = Arena::with_walls(vec![WallChunk {
            id: "wall_0_0_0".to_string(),
            rect: Rect::new(480.0, 440.0, 40.0, 40.0),
            kind: WallKind::Destructible { health: 3 },
        }]);
        let mut bot = bot_at(500.0, 500.0, 0.0);
        if let Some(brain) = bot.brain.as_mut() {
            brain.patrol_heading = 0.0;
            brain.patrol_timer = 3.0;
        }
        let mut rng = StdRng::seed_from_u64(5);
        steer(&mut bot, &[], &arena, DT, 0, &mut rng);
        assert_eq!(bot.brain.unwrap().patrol_timer, 0.0);
    }

    #[test]
    fn test_humans_are_not_steered() {
        let arena = Arena::with_walls(Vec::new());
        let mut human = Player::new(PlayerId(1), "Human".to_string(), "#fff".to_string(), 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(6);
        assert!(steer(&mut human, &[target(2, 10.0, 0.0)], &arena, DT, 0, &mut rng).is_none());
        assert_eq!(human.input, InputState::default());
    }
}
