use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Category of a recorded match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Casual,
    Tournament,
}

/// Historical record of one decisive match, shared by every store backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRecordEntity {
    /// Account id of the slot 0 player, if they were signed in.
    pub player1_id: Option<i64>,
    pub player1_nickname: String,
    /// Account id of the slot 1 player, if they were signed in.
    pub player2_id: Option<i64>,
    pub player2_nickname: String,
    pub winner_id: Option<i64>,
    pub winner_nickname: String,
    pub player1_score: u32,
    pub player2_score: u32,
    pub game_type: GameType,
    /// Set for tournament matches only.
    pub tournament_id: Option<i64>,
    /// Bracket match identifier, set for tournament matches only.
    pub match_id: Option<String>,
    /// When the first player took a slot.
    pub started_at: SystemTime,
    /// When the decisive point was scored.
    pub ended_at: SystemTime,
    pub duration_seconds: u64,
}
