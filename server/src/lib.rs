//! # Arena Server Library
//!
//! Authoritative server for the arena shooter. It owns the canonical world
//! (players, bots, projectiles, destructible walls, floor cells and loot),
//! advances it on a fixed tick and broadcasts the result to every connected
//! client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients only send intent: movement, aim, fire, reload and stat
//! allocation. Physics, collisions, damage, scoring and progression are all
//! resolved here, and nothing outside the tick mutates world state.
//!
//! ### Client Management
//! Each WebSocket connection maps to at most one player from `join` until
//! disconnect. The [`client_manager`] tracks senders, liveness and the
//! player bound to each connection.
//!
//! ### State Broadcasting
//! Every tick ends with a full `gameState` snapshot sent to all joined
//! connections. Hit notifications, level-ups and stat confirmations are sent
//! point-to-point.
//!
//! ## Architecture Design
//!
//! ### Single Owner
//! The [`network::Server`] run loop is the only owner of [`game::GameState`].
//! Connection tasks decode frames and forward them through a single mpsc
//! queue; intents are drained at the start of the next tick, so there are no
//! locks in the hot loop.
//!
//! ### Simulation Clock
//! Time inside the simulation is a millisecond clock advanced by each tick's
//! delta. Cooldowns, reloads and deferred effects (wall regeneration,
//! respawns, loot respawns) are all measured against it, which keeps the
//! simulation reproducible under test.
//!
//! ## Module Organization
//!
//! - [`world`]: arena geometry, wall chunks, floor grid, spawn selection
//! - [`entity`]: players, weapons, projectiles and loot pickups
//! - [`physics`]: movement, jumping, dashing and wall collision
//! - [`combat`]: firing, reloading, projectile travel and hit resolution
//! - [`progression`]: XP curve, kill rewards and stat allocation
//! - [`bot`]: decision loop for server-controlled players
//! - [`schedule`]: deferred effects keyed by due time
//! - [`leaderboard`]: ranking of human players with JSON persistence
//! - [`game`]: the tick that ties all of the above together
//! - [`network`]: WebSocket transport, heartbeat and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod network;
pub mod physics;
pub mod progression;
pub mod schedule;
pub mod world;
