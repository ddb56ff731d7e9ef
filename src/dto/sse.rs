use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::models::GameType, state::simulation::Slot};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name.
    pub event: Option<String>,
    /// JSON body sent as `data:`.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event sent to a new subscriber of the match stream.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Whether finished matches are currently being dropped instead of stored.
    pub degraded: bool,
    /// Number of live rooms at subscription time.
    pub rooms: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// `true` while finished matches cannot be stored.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// One side of a finished match.
pub struct MatchPlayer {
    pub user_id: Option<i64>,
    pub nickname: String,
    pub score: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once per decisive result.
pub struct MatchFinishedEvent {
    pub room_code: String,
    #[schema(value_type = String, example = "tournament")]
    pub game_type: GameType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// Slot 0 then slot 1.
    #[schema(value_type = Vec<MatchPlayer>)]
    pub players: [MatchPlayer; 2],
    /// Winning slot index.
    #[schema(value_type = u8)]
    pub winner: Slot,
    pub duration_seconds: u64,
    /// RFC 3339 timestamp of the decisive point.
    pub ended_at: String,
}
