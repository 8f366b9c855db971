use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by the transport and persistence layers. Nothing inside
/// the tick returns these; simulation faults are rejected actions, not errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("leaderboard file {path}: {source}")]
    Leaderboard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("leaderboard file {path} is corrupt: {source}")]
    LeaderboardFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
