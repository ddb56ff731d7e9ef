use thiserror::Error;

/// Errors raised while binding a connection to a room.
///
/// The `Display` output is sent verbatim to the client in an `error` event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    /// No live room is registered under the requested code.
    #[error("Room not found")]
    RoomNotFound(String),
    /// Both slots of the room are taken.
    #[error("Room is full")]
    RoomFull(String),
    /// The room's match already has a winner; it only waits for its players to leave.
    #[error("Match already finished")]
    MatchFinished(String),
    /// The connection is already bound to a room.
    #[error("Already in a room")]
    AlreadyInRoom,
    /// The room request was well-formed JSON but its fields were not acceptable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RoomError {
    /// Room code involved in the failure, when there is one.
    pub fn room_code(&self) -> Option<&str> {
        match self {
            RoomError::RoomNotFound(code)
            | RoomError::RoomFull(code)
            | RoomError::MatchFinished(code) => Some(code),
            RoomError::AlreadyInRoom | RoomError::InvalidRequest(_) => None,
        }
    }
}
