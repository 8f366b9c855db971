//! Ranking of human players, kept in memory and flushed to a JSON file.
//!
//! Rows are keyed by player name and only ever improve: each update keeps the
//! best value seen for every counter.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::protocol::LeaderboardRow;
use shared::XP_PER_KILL;

use crate::entity::Player;
use crate::error::ServerError;

pub const MAX_ENTRIES: usize = 1000;
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub xp: u32,
    #[serde(default)]
    pub wallet: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub last_played: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    players: Vec<LeaderboardEntry>,
    #[serde(default)]
    last_update: Option<u64>,
    #[serde(skip)]
    dirty: bool,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a leaderboard file's contents.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut board: Leaderboard = serde_json::from_str(text)?;
        board.sort_and_truncate();
        Ok(board)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads the board from disk. A missing file yields an empty board.
    pub async fn load(path: &Path) -> Result<Self, ServerError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No leaderboard at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(ServerError::Leaderboard {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let board = Self::from_json(&text).map_err(|source| ServerError::LeaderboardFormat {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "Loaded {} leaderboard entries from {}",
            board.players.len(),
            path.display()
        );
        Ok(board)
    }

    /// Records a player's current totals. Bots are never ranked.
    pub fn record(&mut self, player: &Player) {
        if player.is_bot() {
            return;
        }

        let entry = LeaderboardEntry {
            name: player.name.clone(),
            level: player.level,
            kills: player.kills,
            deaths: player.deaths,
            xp: player.kills.saturating_mul(XP_PER_KILL),
            wallet: None,
            last_played: unix_now(),
        };

        match self.players.iter_mut().find(|row| row.name == entry.name) {
            Some(existing) => {
                existing.level = existing.level.max(entry.level);
                existing.kills = existing.kills.max(entry.kills);
                existing.deaths = existing.deaths.max(entry.deaths);
                existing.xp = existing.xp.max(entry.xp);
                existing.last_played = entry.last_played;
            }
            None => self.players.push(entry),
        }

        self.sort_and_truncate();
        self.dirty = true;
        debug!("Leaderboard updated for {}", player.name);
    }

    fn sort_and_truncate(&mut self) {
        // Stable sort keeps earlier entries ahead on ties.
        self.players.sort_by(|a, b| b.xp.cmp(&a.xp));
        self.players.truncate(MAX_ENTRIES);
    }

    pub fn top(&self, limit: usize) -> Vec<LeaderboardRow> {
        self.players
            .iter()
            .take(limit)
            .enumerate()
            .map(|(index, entry)| LeaderboardRow {
                rank: index + 1,
                name: entry.name.clone(),
                level: entry.level,
                kills: entry.kills,
                deaths: entry.deaths,
                points: entry.xp,
                has_wallet: entry.wallet.is_some(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serializes the board for a flush and clears the dirty flag.
    pub fn take_snapshot(&mut self) -> Result<String, serde_json::Error> {
        self.last_update = Some(unix_now());
        let json = self.to_json()?;
        self.dirty = false;
        Ok(json)
    }
}

/// Writes a serialized board to disk.
pub async fn save(path: &Path, json: String) -> Result<(), ServerError> {
    let to_error = |source| ServerError::Leaderboard {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
    }
    tokio::fs::write(path, json).await.map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerId;

    fn player(name: &str, kills: u32, deaths: u32, level: u32) -> Player {
        let mut player = Player::new(PlayerId(1), name.to_string(), "#fff".to_string(), 0.0, 0.0);
        player.kills = kills;
        player.deaths = deaths;
        player.level = level;
        player
    }

    #[test]
    fn test_ranked_by_points() {
        let mut board = Leaderboard::new();
        board.record(&player("Low", 1, 0, 2));
        board.record(&player("High", 5, 3, 3));
        board.record(&player("Mid", 3, 1, 2));

        let rows = board.top(DEFAULT_LIMIT);
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].points, 500);
        assert!(!rows[0].has_wallet);
        assert!(board.is_dirty());
    }

    #[test]
    fn test_keeps_best_values() {
        let mut board = Leaderboard::new();
        board.record(&player("Same", 6, 2, 4));
        board.record(&player("Same", 1, 3, 1));

        assert_eq!(board.len(), 1);
        let row = &board.top(1)[0];
        assert_eq!(row.kills, 6);
        assert_eq!(row.deaths, 3);
        assert_eq!(row.level, 4);
    }

    #[test]
    fn test_bots_are_not_ranked() {
        let mut board = Leaderboard::new();
        let bot = Player::new_bot(
            PlayerId(9),
            "Pinkie-Bot".to_string(),
            "#fff".to_string(),
            0.0,
            0.0,
            0.0,
        );
        board.record(&bot);
        assert!(board.is_empty());
        assert!(!board.is_dirty());
    }

    #[test]
    fn test_limit_and_cap() {
        let mut board = Leaderboard::new();
        for i in 0..(MAX_ENTRIES + 5) as u32 {
            board.record(&player(&format!("P{}", i), i, 0, 1));
        }
        assert_eq!(board.len(), MAX_ENTRIES);
        assert_eq!(board.top(10).len(), 10);
        assert_eq!(board.top(1)[0].kills, MAX_ENTRIES as u32 + 4);
    }

    #[test]
    fn test_json_round_trip_clears_dirty() {
        let mut board = Leaderboard::new();
        board.record(&player("Saved", 2, 1, 2));
        let json = board.take_snapshot().unwrap();
        assert!(!board.is_dirty());

        let loaded = Leaderboard::from_json(&json).unwrap();
        assert_eq!(loaded.top(DEFAULT_LIMIT), board.top(DEFAULT_LIMIT));
        assert!(json.contains("\"lastUpdate\""));
    }

    #[test]
    fn test_reads_file_with_wallets() {
        let json = r#"{"players":[{"name":"Linked","level":3,"kills":4,"deaths":1,"xp":400,"wallet":"0xabc"}],"lastUpdate":null}"#;
        let board = Leaderboard::from_json(json).unwrap();
        let rows = board.top(DEFAULT_LIMIT);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_wallet);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let path = std::env::temp_dir().join("arena-leaderboard-missing-test.json");
        let board = tokio_test::block_on(async {
            let _ = tokio::fs::remove_file(&path).await;
            Leaderboard::load(&path).await
        })
        .unwrap();
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join("arena-leaderboard-test")
            .join("board.json");
        let mut board = Leaderboard::new();
        board.record(&player("Disk", 3, 0, 2));
        save(&path, board.take_snapshot().unwrap()).await.unwrap();

        let loaded = Leaderboard::load(&path).await.unwrap();
        assert_eq!(loaded.top(1)[0].name, "Disk");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
