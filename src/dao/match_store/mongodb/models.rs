use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{GameType, MatchRecordEntity};

/// Document stored in the `game_sessions` collection.
///
/// BSON has no unsigned integers, so scores and durations are widened to `i64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    pub player1_id: Option<i64>,
    pub player1_nickname: String,
    pub player2_id: Option<i64>,
    pub player2_nickname: String,
    pub winner_id: Option<i64>,
    pub winner_nickname: String,
    pub player1_score: i64,
    pub player2_score: i64,
    pub game_type: GameType,
    pub tournament_id: Option<i64>,
    pub match_id: Option<String>,
    pub started_at: DateTime,
    pub ended_at: DateTime,
    pub duration_seconds: i64,
}

impl From<MatchRecordEntity> for MongoMatchDocument {
    fn from(value: MatchRecordEntity) -> Self {
        Self {
            player1_id: value.player1_id,
            player1_nickname: value.player1_nickname,
            player2_id: value.player2_id,
            player2_nickname: value.player2_nickname,
            winner_id: value.winner_id,
            winner_nickname: value.winner_nickname,
            player1_score: i64::from(value.player1_score),
            player2_score: i64::from(value.player2_score),
            game_type: value.game_type,
            tournament_id: value.tournament_id,
            match_id: value.match_id,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: DateTime::from_system_time(value.ended_at),
            duration_seconds: i64::try_from(value.duration_seconds).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use mongodb::bson;

    use super::*;

    #[test]
    fn tournament_record_maps_to_flat_document() {
        let started_at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let record = MatchRecordEntity {
            player1_id: Some(1),
            player1_nickname: "ada".into(),
            player2_id: None,
            player2_nickname: "Player 2".into(),
            winner_id: Some(1),
            winner_nickname: "ada".into(),
            player1_score: 11,
            player2_score: 7,
            game_type: GameType::Tournament,
            tournament_id: Some(5),
            match_id: Some("r1-m1".into()),
            started_at,
            ended_at: started_at + Duration::from_secs(42),
            duration_seconds: 42,
        };

        let document = bson::serialize_to_document(&MongoMatchDocument::from(record)).unwrap();
        assert_eq!(document.get_str("game_type").unwrap(), "tournament");
        assert_eq!(document.get_i64("player1_score").unwrap(), 11);
        assert_eq!(document.get_i64("tournament_id").unwrap(), 5);
        assert_eq!(document.get_str("match_id").unwrap(), "r1-m1");
        assert_eq!(document.get_i64("duration_seconds").unwrap(), 42);
        assert!(document.get_datetime("started_at").is_ok());
        assert!(document.get("player2_id").is_some_and(|value| value.as_null().is_some()));
    }
}
