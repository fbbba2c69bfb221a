//! High-score table for the arcade mini-games.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::data_dir;
use crate::error::StoreError;

const MAX_PER_GAME: usize = 10;
pub const DEFAULT_TOP_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Snake,
    Pong,
}

impl Game {
    pub fn as_str(&self) -> &'static str {
        match self {
            Game::Snake => "snake",
            Game::Pong => "pong",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "snake" => Some(Game::Snake),
            "pong" => Some(Game::Pong),
            _ => None,
        }
    }

    pub fn all() -> Vec<Game> {
        vec![Game::Snake, Game::Pong]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Game::Snake => "SNAKE",
            Game::Pong => "PONG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub game: Game,
    pub score: u32,
    pub date: DateTime<Utc>,
}

pub struct Leaderboard {
    path: PathBuf,
}

impl Leaderboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::new(data_dir()?.join("leaderboard.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Vec<LeaderboardEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable leaderboard");
            Vec::new()
        })
    }

    /// Record a finished game. Zero scores are ignored and return `false`.
    pub fn record(&self, game: Game, score: u32) -> Result<bool, StoreError> {
        if score == 0 {
            return Ok(false);
        }

        let mut entries = self.entries();
        entries.push(LeaderboardEntry {
            game,
            score,
            date: Utc::now(),
        });

        let kept: Vec<LeaderboardEntry> = Game::all()
            .into_iter()
            .flat_map(|g| ranked(&entries, g).into_iter().take(MAX_PER_GAME))
            .collect();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&kept)?)?;
        Ok(true)
    }

    pub fn top(&self, game: Game, limit: usize) -> Vec<LeaderboardEntry> {
        ranked(&self.entries(), game).into_iter().take(limit).collect()
    }
}

fn ranked(entries: &[LeaderboardEntry], game: Game) -> Vec<LeaderboardEntry> {
    let mut scores: Vec<LeaderboardEntry> = entries
        .iter()
        .filter(|e| e.game == game)
        .cloned()
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_from_str() {
        assert_eq!(Game::from_str("Snake"), Some(Game::Snake));
        assert_eq!(Game::from_str("PONG"), Some(Game::Pong));
        assert_eq!(Game::from_str("tetris"), None);
    }

    #[test]
    fn test_zero_score_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let board = Leaderboard::new(dir.path().join("scores.json"));
        assert!(!board.record(Game::Snake, 0).unwrap());
        assert!(board.entries().is_empty());
    }

    #[test]
    fn test_top_is_sorted_and_per_game() {
        let dir = tempfile::tempdir().unwrap();
        let board = Leaderboard::new(dir.path().join("scores.json"));
        for score in [30, 120, 70] {
            board.record(Game::Snake, score).unwrap();
        }
        board.record(Game::Pong, 5).unwrap();

        let snake: Vec<u32> = board.top(Game::Snake, DEFAULT_TOP_LIMIT).iter().map(|e| e.score).collect();
        assert_eq!(snake, vec![120, 70, 30]);
        assert_eq!(board.top(Game::Pong, 1)[0].score, 5);
        assert_eq!(board.top(Game::Snake, 2).len(), 2);
    }

    #[test]
    fn test_keeps_ten_best_per_game() {
        let dir = tempfile::tempdir().unwrap();
        let board = Leaderboard::new(dir.path().join("scores.json"));
        for score in 1..=12 {
            board.record(Game::Pong, score).unwrap();
        }
        board.record(Game::Snake, 1).unwrap();

        let pong = board.top(Game::Pong, 100);
        assert_eq!(pong.len(), MAX_PER_GAME);
        assert_eq!(pong.last().unwrap().score, 3);
        assert_eq!(board.entries().len(), MAX_PER_GAME + 1);
    }
}
