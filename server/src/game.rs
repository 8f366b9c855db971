//! The authoritative world and its fixed-rate tick.
//!
//! [`GameState`] is owned by a single driver (the network run loop or a
//! test). Client intents arrive as [`GameCommand`]s and are queued until the
//! next tick; everything the tick wants to tell clients is collected as
//! [`GameMessage`]s in an outbox the driver drains after each call.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::{LeaderboardRow, MapData, SyncedProgress, WorldSnapshot};
use shared::{
    circle_intersects_rect, InputState, LootType, PlayerId, ServerMessage, FLOOR_GRID_SIZE,
    FLOOR_TILE_SIZE, LOOT_RESPAWN_MS, MAX_DELTA_TIME, PLAYER_RADIUS, RESPAWN_DELAY_MS,
    WALL_HEIGHT, WALL_REGEN_MS,
};

use crate::bot::{self, Target, BOT_NAMES};
use crate::combat::{self, Aim, ProjectileFate};
use crate::config::GameConfig;
use crate::entity::{LootBox, Player, Projectile, PLAYER_COLORS};
use crate::leaderboard::Leaderboard;
use crate::physics::{self, Motion};
use crate::progression;
use crate::schedule::{Deferred, Schedule};
use crate::world::{self, Arena, FloorGrid, WallDamage, LOOT_SPAWNS};

const DEFAULT_PLAYER_NAME: &str = "Player";
const MAX_NAME_LENGTH: usize = 24;

/// Outbound notification produced by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    /// Point-to-point message for one player.
    Send { to: PlayerId, message: ServerMessage },
    /// Message for every joined player, optionally skipping one.
    Broadcast {
        message: ServerMessage,
        exclude: Option<PlayerId>,
    },
}

/// Client intent waiting for the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Input {
        player: PlayerId,
        input: InputState,
    },
    Shoot {
        player: PlayerId,
        angle: Option<f32>,
    },
    Reload {
        player: PlayerId,
    },
    AllocateStat {
        player: PlayerId,
        stat: String,
    },
    SyncStats {
        player: PlayerId,
        progress: SyncedProgress,
    },
}

pub struct GameState {
    config: GameConfig,
    clock_ms: f64,
    tick: u64,
    arena: Arena,
    floor: FloorGrid,
    players: BTreeMap<PlayerId, Player>,
    projectiles: Vec<Projectile>,
    loot: Vec<LootBox>,
    schedule: Schedule,
    leaderboard: Leaderboard,
    commands: VecDeque<GameCommand>,
    outbox: Vec<GameMessage>,
    rng: StdRng,
    next_player_id: u32,
    next_projectile_id: u64,
}

impl GameState {
    /// Builds the arena, scatters loot and seeds the configured bots.
    pub fn new(config: GameConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let loot = LOOT_SPAWNS
            .iter()
            .enumerate()
            .map(|(index, &(x, y))| LootBox::new(index, x, y, random_loot(&mut rng)))
            .collect();

        let mut game = Self {
            floor: FloorGrid::new(config.floor_destruction),
            config,
            clock_ms: 0.0,
            tick: 0,
            arena: Arena::new(),
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            loot,
            schedule: Schedule::new(),
            leaderboard: Leaderboard::new(),
            commands: VecDeque::new(),
            outbox: Vec::new(),
            rng,
            next_player_id: 1,
            next_projectile_id: 1,
        };

        for _ in 0..game.config.bot_count {
            game.add_bot();
        }
        info!(
            "Game created with {} bots, floor destruction {}",
            game.config.bot_count,
            if game.config.floor_destruction {
                "on"
            } else {
                "off"
            }
        );
        game
    }

    /// Simulation time in whole milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock_ms as u64
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn floor(&self) -> &FloorGrid {
        &self.floor
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot()).count()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn loot_boxes(&self) -> &[LootBox] {
        &self.loot
    }

    pub fn pending_events(&self) -> usize {
        self.schedule.len()
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn leaderboard_mut(&mut self) -> &mut Leaderboard {
        &mut self.leaderboard
    }

    pub fn set_leaderboard(&mut self, leaderboard: Leaderboard) {
        self.leaderboard = leaderboard;
    }

    pub fn leaderboard_rows(&self, limit: usize) -> Vec<LeaderboardRow> {
        self.leaderboard.top(limit)
    }

    fn allocate_id(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        id
    }

    fn random_color(&mut self) -> String {
        PLAYER_COLORS[self.rng.gen_range(0..PLAYER_COLORS.len())].to_string()
    }

    pub fn add_bot(&mut self) -> PlayerId {
        let id = self.allocate_id();
        let (x, y) = world::choose_spawn(&self.arena, &self.floor, &mut self.rng);
        let name = BOT_NAMES[self.rng.gen_range(0..BOT_NAMES.len())].to_string();
        let color = self.random_color();
        let heading = self.rng.gen_range(0.0..std::f32::consts::PI * 2.0);
        let bot = Player::new_bot(id, name, color, x, y, heading);
        debug!("Bot {} ({}) spawned at ({:.0}, {:.0})", bot.name, id, x, y);
        self.players.insert(id, bot);
        id
    }

    /// Adds a human player, sends them the static world and announces them to
    /// everyone else.
    pub fn join(&mut self, name: Option<String>) -> PlayerId {
        let id = self.allocate_id();
        let (x, y) = world::choose_spawn(&self.arena, &self.floor, &mut self.rng);
        let color = self.random_color();
        let player = Player::new(id, sanitize_name(name), color, x, y);
        info!("Player {} joined ({}) at ({:.0}, {:.0})", player.name, id, x, y);

        let snapshot = player.snapshot(self.now_ms());
        self.players.insert(id, player);

        self.outbox.push(GameMessage::Send {
            to: id,
            message: ServerMessage::Welcome {
                player_id: id,
                map: self.map_data(),
            },
        });
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::PlayerJoined { player: snapshot },
            exclude: Some(id),
        });
        id
    }

    /// Removes a player. Their in-flight projectiles keep flying.
    pub fn leave(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.remove(&id) else {
            return false;
        };
        info!("Player {} left ({})", player.name, id);
        self.commands.retain(|command| command_player(command) != id);
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::PlayerLeft { player_id: id },
            exclude: None,
        });
        true
    }

    pub fn submit(&mut self, command: GameCommand) {
        self.commands.push_back(command);
    }

    pub fn drain_outbox(&mut self) -> Vec<GameMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn map_data(&self) -> MapData {
        MapData {
            width: self.arena.width,
            height: self.arena.height,
            walls: self.arena.wall_data(),
            loot_boxes: self
                .loot
                .iter()
                .filter(|loot| loot.active)
                .map(LootBox::to_data)
                .collect(),
            floor_tile_size: FLOOR_TILE_SIZE,
            floor_grid_size: FLOOR_GRID_SIZE,
            destroyed_tiles: self.floor.destroyed_cells(),
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let now = self.now_ms();
        WorldSnapshot {
            players: self
                .players
                .iter()
                .map(|(id, player)| (*id, player.snapshot(now)))
                .collect(),
        }
    }

    /// Advances the world by `dt` seconds (capped) and queues a full
    /// snapshot broadcast.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_DELTA_TIME)
        } else {
            0.0
        };
        self.clock_ms += dt as f64 * 1000.0;
        self.tick += 1;
        let now = self.now_ms();

        self.apply_commands(now);
        self.update_bots(dt, now);
        self.update_players(dt, now);
        self.update_projectiles(dt, now);
        self.run_schedule(now);

        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::GameState {
                state: self.snapshot(),
            },
            exclude: None,
        });
    }

    fn apply_commands(&mut self, now: u64) {
        while let Some(command) = self.commands.pop_front() {
            match command {
                GameCommand::Input { player, input } => {
                    if let Some(player) = self.players.get_mut(&player) {
                        if player.alive {
                            player.input = input;
                        }
                    }
                }
                GameCommand::Shoot { player, angle } => {
                    if let Some(shooter) = self.players.get_mut(&player) {
                        if let Some(angle) = angle.filter(|a| a.is_finite()) {
                            if shooter.alive {
                                shooter.angle = angle;
                            }
                        }
                    }
                    self.fire(player, Aim::Facing, now);
                }
                GameCommand::Reload { player } => {
                    if let Some(player) = self.players.get_mut(&player) {
                        combat::start_reload(player, now);
                    }
                }
                GameCommand::AllocateStat { player, stat } => self.allocate(player, &stat),
                GameCommand::SyncStats { player, progress } => self.sync(player, &progress),
            }
        }
    }

    fn allocate(&mut self, id: PlayerId, stat: &str) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        match progression::allocate_stat(player, stat) {
            Ok((stat, new_value)) => {
                debug!("Player {} put a point into {}", id, stat);
                self.outbox.push(GameMessage::Send {
                    to: id,
                    message: ServerMessage::StatAllocated {
                        stat,
                        new_value,
                        skill_points: player.skill_points,
                        stats: player.stats,
                        max_health: player.max_health,
                        max_ammo: player.weapon.max_ammo,
                    },
                });
            }
            Err(err) => debug!("Rejected stat allocation from {}: {}", id, err),
        }
    }

    fn sync(&mut self, id: PlayerId, progress: &SyncedProgress) {
        let now = self.now_ms();
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        progression::sync_progress(player, progress);
        info!("Synced saved progress for {} ({})", player.name, id);

        let mut players = BTreeMap::new();
        players.insert(id, player.snapshot(now));
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::GameState {
                state: WorldSnapshot { players },
            },
            exclude: None,
        });
    }

    fn fire(&mut self, id: PlayerId, aim: Aim, now: u64) {
        let Some(shooter) = self.players.get_mut(&id) else {
            return;
        };
        let projectile_id = self.next_projectile_id;
        let Some(fired) = combat::try_fire(shooter, aim, projectile_id, now, &mut self.rng) else {
            return;
        };
        self.next_projectile_id += 1;

        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::BulletFired {
                bullet: fired.projectile.to_data(fired.angle),
            },
            exclude: None,
        });
        self.projectiles.push(fired.projectile);
    }

    fn run_schedule(&mut self, now: u64) {
        for event in self.schedule.drain_due(now) {
            match event {
                Deferred::RegenerateWall { wall_id } => self.regenerate_wall(&wall_id),
                Deferred::Respawn { player } => self.respawn(player),
                Deferred::RespawnLoot { index } => self.respawn_loot(index),
            }
        }
    }

    fn regenerate_wall(&mut self, wall_id: &str) {
        let Some(wall) = self.arena.regenerate_wall(wall_id) else {
            return;
        };
        let rect = wall.rect;
        let data = wall.to_data();

        // Anyone standing in the footprint ends up on top of it.
        for player in self.players.values_mut() {
            if player.alive
                && player.height < WALL_HEIGHT
                && circle_intersects_rect(player.x, player.y, PLAYER_RADIUS, &rect)
            {
                player.height = WALL_HEIGHT;
                player.vz = 0.0;
                player.grounded = true;
            }
        }

        debug!("Wall {} regenerated", wall_id);
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::WallRegenerated { wall: data },
            exclude: None,
        });
    }

    fn respawn(&mut self, id: PlayerId) {
        let (x, y) = world::choose_spawn(&self.arena, &self.floor, &mut self.rng);
        match self.players.get_mut(&id) {
            Some(player) if !player.alive => {
                player.respawn_at(x, y);
                debug!("Player {} respawned at ({:.0}, {:.0})", id, x, y);
            }
            _ => debug!("Skipping respawn for {}", id),
        }
    }

    fn respawn_loot(&mut self, index: usize) {
        let loot_type = random_loot(&mut self.rng);
        let Some(loot) = self.loot.get_mut(index).filter(|loot| !loot.active) else {
            return;
        };
        loot.active = true;
        loot.loot_type = loot_type;
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::LootBoxSpawn {
                loot_box: loot.to_data(),
            },
            exclude: None,
        });
    }

    fn update_bots(&mut self, dt: f32, now: u64) {
        let targets: Vec<Target> = self
            .players
            .values()
            .filter(|player| player.alive)
            .map(Target::of)
            .collect();
        let bots: Vec<PlayerId> = self
            .players
            .values()
            .filter(|player| player.is_bot() && player.alive)
            .map(|player| player.id)
            .collect();

        for id in bots {
            let aim = match self.players.get_mut(&id) {
                Some(bot) => bot::steer(bot, &targets, &self.arena, dt, now, &mut self.rng),
                None => None,
            };
            if let Some(aim) = aim {
                self.fire(id, aim, now);
            }
        }
    }

    fn update_players(&mut self, dt: f32, now: u64) {
        let mut fell = Vec::new();
        let mut pickups = Vec::new();

        for player in self.players.values_mut() {
            if !player.alive {
                continue;
            }
            physics::apply_intent(player, &self.arena, now);
            if physics::integrate(player, &self.arena, &self.floor, dt, now) == Motion::FellOut {
                fell.push(player.id);
                continue;
            }
            combat::regenerate(player, dt, now);
            combat::update_reload(player, now);

            for (index, loot) in self.loot.iter_mut().enumerate() {
                if combat::try_pickup(player, loot) {
                    pickups.push((index, player.id, loot.id.clone(), loot.loot_type));
                }
            }
        }

        for (index, player_id, box_id, loot_type) in pickups {
            self.schedule
                .schedule(now + LOOT_RESPAWN_MS, Deferred::RespawnLoot { index });
            self.outbox.push(GameMessage::Broadcast {
                message: ServerMessage::LootBoxPickup {
                    box_id,
                    player_id,
                    loot_type,
                },
                exclude: None,
            });
        }

        for id in fell {
            self.fall_death(id, now);
        }
    }

    fn fall_death(&mut self, id: PlayerId, now: u64) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.alive = false;
        player.health = 0.0;
        player.deaths = player.deaths.saturating_add(1);
        player.kill_streak = 0;
        info!("{} fell out of the arena", player.name);

        let snapshot = player.snapshot(now);
        self.leaderboard.record(player);
        self.schedule
            .schedule(now + RESPAWN_DELAY_MS, Deferred::Respawn { player: id });
        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::PlayerFell { player: snapshot },
            exclude: None,
        });
    }

    fn update_projectiles(&mut self, dt: f32, now: u64) {
        let in_flight = std::mem::take(&mut self.projectiles);
        let mut remaining = Vec::with_capacity(in_flight.len());

        for mut projectile in in_flight {
            let fate = combat::step_projectile(
                &mut projectile,
                &mut self.arena,
                &mut self.floor,
                &self.players,
                dt,
                now,
            );
            match fate {
                ProjectileFate::Flying => remaining.push(projectile),
                ProjectileFate::Expired => {}
                ProjectileFate::HitWall(WallDamage::Destroyed { wall_id }) => {
                    debug!("Wall {} destroyed", wall_id);
                    self.schedule.schedule(
                        now + WALL_REGEN_MS,
                        Deferred::RegenerateWall {
                            wall_id: wall_id.clone(),
                        },
                    );
                    self.outbox.push(GameMessage::Broadcast {
                        message: ServerMessage::WallDestroyed { wall_id },
                        exclude: None,
                    });
                }
                ProjectileFate::HitWall(_) => {}
                ProjectileFate::HitFloor {
                    destroyed: Some(cell),
                } => {
                    self.outbox.push(GameMessage::Broadcast {
                        message: ServerMessage::FloorTileDestroyed {
                            gx: cell.gx,
                            gy: cell.gy,
                        },
                        exclude: None,
                    });
                }
                ProjectileFate::HitFloor { destroyed: None } => {}
                ProjectileFate::HitPlayer(victim) => self.resolve_hit(victim, &projectile, now),
            }
        }

        self.projectiles = remaining;
    }

    fn resolve_hit(&mut self, victim_id: PlayerId, projectile: &Projectile, now: u64) {
        let Some(victim) = self.players.get_mut(&victim_id) else {
            return;
        };
        let hit = combat::apply_hit(victim, projectile, now);
        if !victim.is_bot() {
            self.outbox.push(GameMessage::Send {
                to: victim_id,
                message: ServerMessage::PlayerHit {
                    damage: hit.damage,
                    hit_zone: hit.zone,
                },
            });
        }

        let killer_id = projectile.owner;
        if self.players.get(&killer_id).is_some_and(|p| !p.is_bot()) {
            self.outbox.push(GameMessage::Send {
                to: killer_id,
                message: ServerMessage::HitConfirm {
                    hit_zone: hit.zone,
                    damage: hit.damage,
                },
            });
        }

        if !hit.killed {
            return;
        }

        self.schedule
            .schedule(now + RESPAWN_DELAY_MS, Deferred::Respawn { player: victim_id });
        let victim_snapshot = match self.players.get(&victim_id) {
            Some(victim) => {
                self.leaderboard.record(victim);
                victim.snapshot(now)
            }
            None => return,
        };

        let Some(killer) = self.players.get_mut(&killer_id) else {
            debug!("{} died to a projectile from a departed player", victim_id);
            return;
        };
        let reward = progression::credit_kill(killer, hit.zone);
        info!(
            "[Kill] {} -> {} ({:?}, +{} xp)",
            killer.name, victim_snapshot.name, hit.zone, reward.xp_gain
        );

        if reward.new_points > 0 && !killer.is_bot() {
            self.outbox.push(GameMessage::Send {
                to: killer_id,
                message: ServerMessage::LevelUp {
                    level: reward.level,
                    skill_points: killer.skill_points,
                    new_points: reward.new_points,
                },
            });
        }
        self.leaderboard.record(killer);

        self.outbox.push(GameMessage::Broadcast {
            message: ServerMessage::PlayerKilled {
                killer: killer.snapshot(now),
                victim: victim_snapshot,
                weapon: killer.weapon.kind,
                hit_zone: hit.zone,
                xp_gain: reward.xp_gain,
                kill_streak: reward.kill_streak,
            },
            exclude: None,
        });
    }
}

fn command_player(command: &GameCommand) -> PlayerId {
    match command {
        GameCommand::Input { player, .. }
        | GameCommand::Shoot { player, .. }
        | GameCommand::Reload { player }
        | GameCommand::AllocateStat { player, .. }
        | GameCommand::SyncStats { player, .. } => *player,
    }
}

fn random_loot(rng: &mut StdRng) -> LootType {
    LootType::ALL[rng.gen_range(0..LootType::ALL.len())]
}

fn sanitize_name(name: Option<String>) -> String {
    let name = name.unwrap_or_default();
    let trimmed: String = name.trim().chars().take(MAX_NAME_LENGTH).collect();
    if trimmed.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{HitZone, Stat, HUMAN_BULLET_DAMAGE, RELOAD_DURATION_MS};

    const DT: f32 = 1.0 / 60.0;

    fn quiet_game() -> GameState {
        GameState::new(GameConfig {
            bot_count: 0,
            floor_destruction: false,
            seed: Some(42),
        })
    }

    fn run_for(game: &mut GameState, millis: u64) {
        let target = game.now_ms() + millis;
        while game.now_ms() < target {
            game.tick(DT);
        }
    }

    fn messages_of(outbox: &[GameMessage], kind: &str) -> usize {
        outbox
            .iter()
            .filter(|msg| match msg {
                GameMessage::Send { message, .. } | GameMessage::Broadcast { message, .. } => {
                    message.kind() == kind
                }
            })
            .count()
    }

    /// Places `shooter` facing `target` from 30 units away in open ground.
    fn line_up(game: &mut GameState, shooter: PlayerId, target: PlayerId) {
        let shooter = game.player_mut(shooter).unwrap();
        shooter.x = 300.0;
        shooter.y = 330.0;
        shooter.angle = 0.0;
        let target = game.player_mut(target).unwrap();
        target.x = 300.0;
        target.y = 300.0;
    }

    #[test]
    fn test_new_game_spawns_bots_and_loot() {
        let game = GameState::new(GameConfig {
            bot_count: 5,
            floor_destruction: false,
            seed: Some(1),
        });
        assert_eq!(game.players().filter(|p| p.is_bot()).count(), 5);
        assert_eq!(game.human_count(), 0);
        assert_eq!(game.loot_boxes().len(), LOOT_SPAWNS.len());
        for bot in game.players() {
            assert!(BOT_NAMES.contains(&bot.name.as_str()));
            assert!(!game.arena().collides(bot.x, bot.y, PLAYER_RADIUS));
        }
    }

    #[test]
    fn test_join_sends_welcome_and_announces() {
        let mut game = quiet_game();
        let first = game.join(Some("First".to_string()));
        game.drain_outbox();

        let second = game.join(Some("  Second  ".to_string()));
        let outbox = game.drain_outbox();

        assert_ne!(first, second);
        assert_eq!(game.player(second).unwrap().name, "Second");
        let wall_count = game.arena().walls().len();
        assert!(outbox.iter().any(|msg| matches!(
            msg,
            GameMessage::Send { to, message: ServerMessage::Welcome { player_id, map } }
                if *to == second && *player_id == second && map.walls.len() == wall_count
        )));
        assert!(outbox.iter().any(|msg| matches!(
            msg,
            GameMessage::Broadcast { message: ServerMessage::PlayerJoined { .. }, exclude }
                if *exclude == Some(second)
        )));
    }

    #[test]
    fn test_default_name() {
        let mut game = quiet_game();
        let id = game.join(None);
        assert_eq!(game.player(id).unwrap().name, DEFAULT_PLAYER_NAME);
        let id = game.join(Some("   ".to_string()));
        assert_eq!(game.player(id).unwrap().name, DEFAULT_PLAYER_NAME);
    }

    #[test]
    fn test_leave_broadcasts_and_drops_commands() {
        let mut game = quiet_game();
        let id = game.join(Some("Leaver".to_string()));
        game.submit(GameCommand::Reload { player: id });
        game.drain_outbox();

        assert!(game.leave(id));
        assert!(!game.leave(id));
        let outbox = game.drain_outbox();
        assert_eq!(messages_of(&outbox, "playerLeft"), 1);
        game.tick(DT);
        assert!(game.player(id).is_none());
    }

    #[test]
    fn test_tick_broadcasts_snapshot() {
        let mut game = quiet_game();
        let id = game.join(None);
        game.drain_outbox();
        game.tick(DT);
        let outbox = game.drain_outbox();
        let snapshot = outbox.iter().find_map(|msg| match msg {
            GameMessage::Broadcast {
                message: ServerMessage::GameState { state },
                ..
            } => Some(state.clone()),
            _ => None,
        });
        assert!(snapshot.unwrap().players.contains_key(&id));
        assert_eq!(game.tick_count(), 1);
    }

    #[test]
    fn test_delta_is_capped() {
        let mut game = quiet_game();
        game.tick(5.0);
        assert_eq!(game.now_ms(), 50);
        game.tick(f32::NAN);
        assert_eq!(game.now_ms(), 50);
    }

    #[test]
    fn test_input_is_latest_wins() {
        let mut game = quiet_game();
        let id = game.join(None);
        game.submit(GameCommand::Input {
            player: id,
            input: InputState {
                x: 1.0,
                ..InputState::default()
            },
        });
        game.submit(GameCommand::Input {
            player: id,
            input: InputState {
                y: 1.0,
                ..InputState::default()
            },
        });
        game.tick(DT);
        let player = game.player(id).unwrap();
        assert_eq!(player.input.x, 0.0);
        assert_eq!(player.input.y, 1.0);
    }

    #[test]
    fn test_body_shot_damage_end_to_end() {
        let mut game = quiet_game();
        let shooter = game.join(Some("Shooter".to_string()));
        let target = game.join(Some("Target".to_string()));
        line_up(&mut game, shooter, target);
        game.drain_outbox();

        game.submit(GameCommand::Shoot {
            player: shooter,
            angle: Some(0.0),
        });
        game.tick(DT);
        game.tick(DT);

        let target_state = game.player(target).unwrap();
        assert_eq!(target_state.health, 100.0 - HUMAN_BULLET_DAMAGE);
        assert!(game.projectiles().is_empty());

        let outbox = game.drain_outbox();
        assert!(outbox.iter().any(|msg| match msg {
            GameMessage::Send {
                to,
                message: ServerMessage::PlayerHit { hit_zone, damage },
            } => *to == target && *hit_zone == HitZone::Body && *damage == HUMAN_BULLET_DAMAGE,
            _ => false,
        }));
        assert!(outbox.iter().any(|msg| matches!(
            msg,
            GameMessage::Send { to, message: ServerMessage::HitConfirm { .. } } if *to == shooter
        )));
        assert_eq!(messages_of(&outbox, "bulletFired"), 1);
    }

    #[test]
    fn test_kill_awards_xp_and_schedules_respawn() {
        let mut game = quiet_game();
        let shooter = game.join(Some("Shooter".to_string()));
        let target = game.join(Some("Target".to_string()));
        line_up(&mut game, shooter, target);
        game.player_mut(target).unwrap().health = 10.0;
        game.drain_outbox();

        game.submit(GameCommand::Shoot {
            player: shooter,
            angle: None,
        });
        game.tick(DT);
        game.tick(DT);

        let victim = game.player(target).unwrap();
        assert!(!victim.alive);
        assert_eq!(victim.deaths, 1);
        let killer = game.player(shooter).unwrap();
        assert_eq!(killer.kills, 1);
        assert_eq!(killer.xp, 100);
        assert_eq!(killer.skill_points, 2);

        let outbox = game.drain_outbox();
        assert_eq!(messages_of(&outbox, "playerKilled"), 1);
        assert_eq!(messages_of(&outbox, "levelUp"), 1);
        assert_eq!(game.leaderboard().len(), 2);

        run_for(&mut game, RESPAWN_DELAY_MS + 50);
        let victim = game.player(target).unwrap();
        assert!(victim.alive);
        assert_eq!(victim.health, victim.max_health);
    }

    #[test]
    fn test_respawn_skipped_after_leave() {
        let mut game = quiet_game();
        let shooter = game.join(None);
        let target = game.join(None);
        line_up(&mut game, shooter, target);
        game.player_mut(target).unwrap().health = 1.0;
        game.submit(GameCommand::Shoot {
            player: shooter,
            angle: None,
        });
        game.tick(DT);
        game.tick(DT);
        assert_eq!(game.pending_events(), 1);

        game.leave(target);
        run_for(&mut game, RESPAWN_DELAY_MS + 50);
        assert!(game.player(target).is_none());
        assert_eq!(game.pending_events(), 0);
    }

    #[test]
    fn test_reload_command() {
        let mut game = quiet_game();
        let id = game.join(None);
        game.player_mut(id).unwrap().weapon.ammo = 0;
        game.submit(GameCommand::Reload { player: id });
        game.tick(DT);
        assert!(game.player(id).unwrap().weapon.reloading);

        run_for(&mut game, RELOAD_DURATION_MS);
        let weapon = &game.player(id).unwrap().weapon;
        assert!(!weapon.reloading);
        assert_eq!(weapon.ammo, 12);
    }

    #[test]
    fn test_allocate_stat_replies() {
        let mut game = quiet_game();
        let id = game.join(None);
        game.player_mut(id).unwrap().skill_points = 1;
        game.drain_outbox();

        game.submit(GameCommand::AllocateStat {
            player: id,
            stat: "health".to_string(),
        });
        game.submit(GameCommand::AllocateStat {
            player: id,
            stat: "health".to_string(),
        });
        game.tick(DT);

        let outbox = game.drain_outbox();
        let replies: Vec<&ServerMessage> = outbox
            .iter()
            .filter_map(|msg| match msg {
                GameMessage::Send { to, message } if *to == id => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(replies.len(), 1);
        match replies[0] {
            ServerMessage::StatAllocated {
                stat,
                new_value,
                skill_points,
                max_health,
                ..
            } => {
                assert_eq!(*stat, Stat::Health);
                assert_eq!(*new_value, 1);
                assert_eq!(*skill_points, 0);
                assert_eq!(*max_health, 110.0);
            }
            other => panic!("Unexpected reply {:?}", other),
        }
        assert_eq!(game.player(id).unwrap().health, 110.0);
    }

    #[test]
    fn test_sync_stats_broadcasts_single_player() {
        let mut game = quiet_game();
        let id = game.join(None);
        game.join(None);
        game.drain_outbox();

        game.submit(GameCommand::SyncStats {
            player: id,
            progress: SyncedProgress {
                name: Some("Restored".to_string()),
                level: Some(4),
                ..SyncedProgress::default()
            },
        });
        game.tick(DT);

        let outbox = game.drain_outbox();
        let single = outbox.iter().any(|msg| matches!(
            msg,
            GameMessage::Broadcast { message: ServerMessage::GameState { state }, .. }
                if state.players.len() == 1 && state.players[&id].name == "Restored"
        ));
        assert!(single);
        assert_eq!(game.player(id).unwrap().level, 4);
    }

    #[test]
    fn test_wall_destruction_and_regeneration() {
        let mut game = quiet_game();
        let shooter = game.join(None);
        // Chunk wall_6_0_3 spans (160..200, 400..440); stand just south of it.
        {
            let player = game.player_mut(shooter).unwrap();
            player.x = 180.0;
            player.y = 480.0;
        }
        assert!(game.arena().wall("wall_6_0_3").is_some());

        for _ in 0..3 {
            game.submit(GameCommand::Shoot {
                player: shooter,
                angle: Some(0.0),
            });
            run_for(&mut game, 400);
        }
        assert!(game.arena().wall("wall_6_0_3").is_none());
        assert!(game.arena().is_destroyed("wall_6_0_3"));
        let destroyed_at = game.now_ms();
        assert_eq!(messages_of(&game.drain_outbox(), "wallDestroyed"), 1);

        run_for(&mut game, WALL_REGEN_MS - 1000);
        assert!(game.arena().wall("wall_6_0_3").is_none());
        run_for(&mut game, 1000);
        assert!(game.arena().wall("wall_6_0_3").is_some());
        assert!(game.now_ms() - destroyed_at >= WALL_REGEN_MS - 400);
        assert_eq!(messages_of(&game.drain_outbox(), "wallRegenerated"), 1);
    }

    #[test]
    fn test_wall_returns_on_the_tick_it_is_due() {
        let mut game = quiet_game();
        let shooter = game.join(None);
        {
            let player = game.player_mut(shooter).unwrap();
            player.x = 180.0;
            player.y = 480.0;
        }

        let mut destroyed_at = None;
        for _ in 0..3 {
            game.submit(GameCommand::Shoot {
                player: shooter,
                angle: Some(0.0),
            });
            for _ in 0..24 {
                game.tick(DT);
                if destroyed_at.is_none() && game.arena().is_destroyed("wall_6_0_3") {
                    destroyed_at = Some(game.now_ms());
                }
            }
        }
        let due = destroyed_at.expect("wall was never destroyed") + WALL_REGEN_MS;

        let tick_ms = (DT * 1000.0).ceil() as u64;
        loop {
            game.tick(DT);
            if game.now_ms() >= due {
                break;
            }
            assert!(
                game.arena().wall("wall_6_0_3").is_none(),
                "wall back early at {} (due {})",
                game.now_ms(),
                due
            );
        }
        assert!(game.arena().wall("wall_6_0_3").is_some());
        assert!(!game.arena().is_destroyed("wall_6_0_3"));
        assert!(game.now_ms() - due <= tick_ms);
    }

    #[test]
    fn test_floor_flag_reaches_grid() {
        let game = GameState::new(GameConfig {
            bot_count: 0,
            floor_destruction: true,
            seed: Some(3),
        });
        assert!(game.config().floor_destruction);
        assert!(game.floor().is_enabled());
        assert!(!quiet_game().floor().is_enabled());
    }

    #[test]
    fn test_loot_pickup_and_respawn() {
        let mut game = quiet_game();
        let id = game.join(None);
        let (x, y) = LOOT_SPAWNS[0];
        {
            let player = game.player_mut(id).unwrap();
            player.x = x;
            player.y = y;
        }
        game.drain_outbox();
        game.tick(DT);
        assert!(!game.loot_boxes()[0].active);
        let outbox = game.drain_outbox();
        assert_eq!(messages_of(&outbox, "lootBoxPickup"), 1);
        assert!(!game
            .map_data()
            .loot_boxes
            .iter()
            .any(|loot| loot.id == "lootbox_0"));

        game.player_mut(id).unwrap().x = 300.0;
        game.player_mut(id).unwrap().y = 300.0;
        run_for(&mut game, LOOT_RESPAWN_MS + 50);
        assert!(game.loot_boxes()[0].active);
        assert_eq!(messages_of(&game.drain_outbox(), "lootBoxSpawn"), 1);
    }

    #[test]
    fn test_nearby_bots_fight() {
        let mut game = GameState::new(GameConfig {
            bot_count: 2,
            floor_destruction: false,
            seed: Some(9),
        });
        let bots: Vec<PlayerId> = game.players().map(|bot| bot.id).collect();
        for (id, y) in bots.iter().zip([1500.0, 1400.0]) {
            let bot = game.player_mut(*id).unwrap();
            bot.x = 1500.0;
            bot.y = y;
        }

        let mut fired = 0;
        for _ in 0..(60 * 5) {
            game.tick(DT);
            fired += messages_of(&game.drain_outbox(), "bulletFired");
        }
        assert!(fired > 0);
        for bot in game.players() {
            if bot.alive && bot.height < WALL_HEIGHT {
                assert!(!game.arena().collides(bot.x, bot.y, PLAYER_RADIUS));
            }
        }
    }
}
