use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::{validate_match_id, validate_nickname},
    state::simulation::{Direction, SimulationState, Slot},
};

const ROOM_REQUEST_TYPES: [&str; 3] = ["create_room", "join_room", "join_tournament_match"];

/// Query parameters accepted on the game WebSocket upgrade.
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConnectParams {
    /// Display name used when a room request carries none.
    #[validate(length(min = 1, max = 32), custom(function = "validate_nickname"))]
    pub nickname: Option<String>,
    /// Account identifier, only used to attribute the persisted result.
    #[validate(range(min = 1))]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
/// Request a new free-play room.
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 32), custom(function = "validate_nickname"))]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Join an existing free-play room by code.
pub struct JoinRoomRequest {
    #[validate(length(min = 1, max = 64))]
    pub room_code: String,
    #[validate(length(min = 1, max = 32), custom(function = "validate_nickname"))]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Join (or lazily create) the room of a tournament bracket match.
pub struct JoinTournamentMatchRequest {
    #[validate(range(min = 1))]
    pub tournament_id: i64,
    #[validate(length(min = 1, max = 64), custom(function = "validate_match_id"))]
    pub match_id: String,
    #[validate(length(min = 1, max = 32), custom(function = "validate_nickname"))]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
/// Latest paddle direction requested by the client.
pub struct InputRequest {
    #[schema(value_type = i8)]
    pub dir: Direction,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
/// Messages accepted from game WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// `create_room`
    CreateRoom(CreateRoomRequest),
    JoinRoom(JoinRoomRequest),
    JoinTournamentMatch(JoinTournamentMatchRequest),
    /// `input`, applied on the next tick.
    Input(InputRequest),
    Ping,
}

/// Why an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, unknown type, or a malformed input/ping frame. Dropped silently.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A room request whose fields are missing or invalid.
    #[error("invalid {kind} request: {reason}")]
    InvalidRoomRequest { kind: String, reason: String },
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .filter(|kind| ROOM_REQUEST_TYPES.contains(kind))
            .map(str::to_owned);

        let message = match (serde_json::from_value::<ClientMessage>(value), kind.clone()) {
            (Ok(message), _) => message,
            (Err(err), Some(kind)) => {
                return Err(DecodeError::InvalidRoomRequest {
                    kind,
                    reason: err.to_string(),
                });
            }
            (Err(err), None) => return Err(DecodeError::Malformed(err)),
        };

        // Only room requests carry validated fields.
        let Some(kind) = kind else {
            return Ok(message);
        };
        match message.validate() {
            Ok(()) => Ok(message),
            Err(errors) => Err(DecodeError::InvalidRoomRequest {
                kind,
                reason: errors.to_string(),
            }),
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::CreateRoom(request) => request.validate(),
            Self::JoinRoom(request) => request.validate(),
            Self::JoinTournamentMatch(request) => request.validate(),
            Self::Input(_) | Self::Ping => Ok(()),
        }
    }
}

impl DecodeError {
    /// Whether the frame was a room request the client must be told about.
    pub fn is_room_request(&self) -> bool {
        matches!(self, Self::InvalidRoomRequest { .. })
    }
}

#[derive(Debug, Serialize)]
/// Events pushed to game WebSocket clients.
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage<'a> {
    /// The connection is bound to `room_code` in `player_index`.
    RoomJoined {
        room_code: &'a str,
        player_index: Slot,
    },
    /// Per-tick snapshot.
    State {
        state: &'a SimulationState,
    },
    /// Rejected request; the connection closes right after.
    Error {
        message: String,
    },
    /// The other player disconnected before a result.
    OpponentLeft,
    /// Decisive result, sent once.
    GameWon {
        winner: Slot,
        winner_score: u32,
        loser_score: u32,
    },
    Pong,
}

impl ServerMessage<'_> {
    /// Encode the event as a WebSocket text frame.
    pub fn to_frame(&self) -> serde_json::Result<Message> {
        let payload = serde_json::to_string(self)?;
        Ok(Message::Text(payload.into()))
    }
}
