use clap::Parser;
use log::{error, info};
use server::config::{GameConfig, ServerConfig, DEFAULT_BOT_COUNT, DEFAULT_MAX_CLIENTS};
use server::network::Server;
use shared::TICK_RATE;
use std::path::PathBuf;

/// Authoritative arena shooter server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
    /// Number of server-controlled players
    #[clap(short, long, default_value_t = DEFAULT_BOT_COUNT)]
    bots: usize,
    /// Let shots destroy floor tiles
    #[clap(long)]
    floor_destruction: bool,
    /// JSON file the leaderboard is loaded from and flushed to
    #[clap(short, long)]
    leaderboard: Option<PathBuf>,
    /// Fixed RNG seed for reproducible matches
    #[clap(long)]
    seed: Option<u64>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_rate: args.tick_rate,
            max_clients: args.max_clients,
            leaderboard_path: args.leaderboard,
            game: GameConfig {
                bot_count: args.bots,
                floor_destruction: args.floor_destruction,
                seed: args.seed,
            },
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    info!(
        "Starting arena server on {} at {} Hz",
        config.bind_addr, config.tick_rate
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
