//! Runtime configuration, built from command line arguments in `main`.

use std::path::PathBuf;
use std::time::Duration;

use shared::TICK_RATE;

pub const DEFAULT_BOT_COUNT: usize = 12;
pub const DEFAULT_MAX_CLIENTS: usize = 64;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;
/// Inbound events queued for the run loop across all connections.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const LEADERBOARD_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Knobs that change simulation rules rather than transport.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub bot_count: usize,
    /// Lets ground hits destroy floor cells and entities fall through holes.
    pub floor_destruction: bool,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bot_count: DEFAULT_BOT_COUNT,
            floor_destruction: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    pub max_clients: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub leaderboard_path: Option<PathBuf>,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            tick_rate: TICK_RATE,
            max_clients: DEFAULT_MAX_CLIENTS,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            client_timeout: CLIENT_TIMEOUT,
            leaderboard_path: None,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Duration of one tick. A zero tick rate falls back to the default.
    pub fn tick_duration(&self) -> Duration {
        let rate = if self.tick_rate == 0 {
            TICK_RATE
        } else {
            self.tick_rate
        };
        Duration::from_secs_f64(1.0 / rate as f64)
    }
}
