//! Per-connection protocol state machine: binds a socket to at most one room
//! and routes its frames there.

use tracing::{debug, info, warn};

use crate::{
    dto::ws::{
        ClientMessage, ConnectParams, CreateRoomRequest, JoinRoomRequest,
        JoinTournamentMatchRequest, ServerMessage,
    },
    error::RoomError,
    services::tick,
    state::{
        SharedState,
        room::{ConnectionId, LeaveOutcome, Outbound, Seat, SharedRoom},
        room_code::RoomCode,
        simulation::Slot,
    },
};

/// Whether the socket should stay open after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading frames.
    Continue,
    /// Send a close frame and tear the connection down.
    Close,
}

enum SessionPhase {
    AwaitingAssignment,
    Bound {
        room: SharedRoom,
        code: RoomCode,
        slot: Slot,
    },
    Closed,
}

/// Protocol state of one game connection.
pub struct Session {
    state: SharedState,
    id: ConnectionId,
    defaults: ConnectParams,
    outbound: Outbound,
    phase: SessionPhase,
}

impl Session {
    /// `defaults` carries the upgrade query parameters, used when a room
    /// request does not name a nickname itself.
    pub fn new(state: SharedState, defaults: ConnectParams, outbound: Outbound) -> Self {
        Self {
            state,
            id: ConnectionId::new_v4(),
            defaults,
            outbound,
            phase: SessionPhase::AwaitingAssignment,
        }
    }

    /// Identifier used in logs and room membership.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Code of the room this connection is bound to.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match &self.phase {
            SessionPhase::Bound { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Slot held in the bound room.
    pub fn slot(&self) -> Option<Slot> {
        match &self.phase {
            SessionPhase::Bound { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Handle one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) -> Flow {
        if matches!(self.phase, SessionPhase::Closed) {
            return Flow::Close;
        }

        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(err) if err.is_room_request() => {
                if self.room_code().is_some() {
                    return self.reject(RoomError::AlreadyInRoom);
                }
                return self.reject(RoomError::InvalidRequest(err.to_string()));
            }
            Err(err) => {
                debug!(connection = %self.id, error = %err, "dropping malformed frame");
                return Flow::Continue;
            }
        };

        match message {
            ClientMessage::Ping => {
                self.outbound.send(&ServerMessage::Pong);
                Flow::Continue
            }
            ClientMessage::Input(input) => {
                match &self.phase {
                    SessionPhase::Bound { room, .. } => {
                        room.lock().await.set_direction(self.id, input.dir);
                    }
                    _ => debug!(connection = %self.id, "dropping input from unbound connection"),
                }
                Flow::Continue
            }
            ClientMessage::CreateRoom(_)
            | ClientMessage::JoinRoom(_)
            | ClientMessage::JoinTournamentMatch(_)
                if self.room_code().is_some() =>
            {
                self.reject(RoomError::AlreadyInRoom)
            }
            ClientMessage::CreateRoom(request) => {
                let result = self.create_room(request).await;
                self.settle(result)
            }
            ClientMessage::JoinRoom(request) => {
                let result = self.join_room(request).await;
                self.settle(result)
            }
            ClientMessage::JoinTournamentMatch(request) => {
                let result = self.join_tournament_match(request).await;
                self.settle(result)
            }
        }
    }

    async fn create_room(&mut self, request: CreateRoomRequest) -> Result<(), RoomError> {
        let (_code, room) = self.state.rooms().create_room();
        self.take_seat(room, request.nickname).await
    }

    async fn join_room(&mut self, request: JoinRoomRequest) -> Result<(), RoomError> {
        let room = self
            .state
            .rooms()
            .get_room(&request.room_code)
            .ok_or_else(|| RoomError::RoomNotFound(request.room_code.clone()))?;
        self.take_seat(room, request.nickname).await
    }

    /// Both bracket participants derive the same code, so whoever arrives
    /// first creates the room.
    async fn join_tournament_match(
        &mut self,
        request: JoinTournamentMatchRequest,
    ) -> Result<(), RoomError> {
        let code = RoomCode::tournament(request.tournament_id, &request.match_id);
        let room = self.state.rooms().get_or_create(code.clone());
        match self.take_seat(room, request.nickname.clone()).await {
            // The room emptied and was retired between lookup and lock.
            Err(RoomError::RoomNotFound(_)) => {
                let room = self.state.rooms().get_or_create(code);
                self.take_seat(room, request.nickname).await
            }
            other => other,
        }
    }

    async fn take_seat(
        &mut self,
        room: SharedRoom,
        nickname: Option<String>,
    ) -> Result<(), RoomError> {
        let nickname = nickname.or_else(|| self.defaults.nickname.clone());
        let mut guard = room.lock().await;
        let slot = guard.join(Seat {
            connection: self.id,
            nickname,
            user_id: self.defaults.user_id,
            outbound: self.outbound.clone(),
        })?;
        tick::ensure_running(&room, &mut guard, self.state.reporter());
        let code = guard.code().clone();
        drop(guard);

        self.phase = SessionPhase::Bound { room, code, slot };
        Ok(())
    }

    fn settle(&mut self, result: Result<(), RoomError>) -> Flow {
        match result {
            Ok(()) => Flow::Continue,
            Err(err) => self.reject(err),
        }
    }

    /// Tell the client why its request failed. The connection must then close.
    fn reject(&mut self, err: RoomError) -> Flow {
        warn!(
            connection = %self.id,
            room = err.room_code().unwrap_or("-"),
            error = %err,
            "rejected room request"
        );
        self.outbound.send(&ServerMessage::Error {
            message: err.to_string(),
        });
        Flow::Close
    }

    /// Detach from the bound room, removing it once nobody is left.
    pub async fn close(&mut self) {
        let phase = std::mem::replace(&mut self.phase, SessionPhase::Closed);
        let SessionPhase::Bound { room, code, slot } = phase else {
            return;
        };

        let mut guard = room.lock().await;
        match guard.leave(self.id) {
            LeaveOutcome::Emptied => {
                self.state.rooms().remove_room(&mut guard);
            }
            LeaveOutcome::OpponentNotified => {
                info!(room = %code, %slot, "match abandoned");
            }
            LeaveOutcome::Remaining | LeaveOutcome::NotPresent => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::AppConfig,
        services::match_reporter,
        state::{AppState, room::OUTBOUND_CAPACITY},
    };

    struct Client {
        session: Session,
        rx: mpsc::Receiver<Message>,
    }

    impl Client {
        fn connect(state: &SharedState, nickname: Option<&str>) -> Self {
            let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let defaults = ConnectParams {
                nickname: nickname.map(str::to_owned),
                user_id: Some(42),
            };
            Self {
                session: Session::new(state.clone(), defaults, Outbound::new(tx)),
                rx,
            }
        }

        async fn send(&mut self, frame: &str) -> Flow {
            self.session.handle_text(frame).await
        }

        fn events(&mut self) -> Vec<Value> {
            let mut events = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                if let Message::Text(text) = frame {
                    events.push(serde_json::from_str(text.as_str()).unwrap());
                }
            }
            events
        }

        fn last_error(&mut self) -> Option<String> {
            self.events()
                .into_iter()
                .filter(|event| event["type"] == "error")
                .last()
                .and_then(|event| event["message"].as_str().map(str::to_owned))
        }
    }

    fn state() -> SharedState {
        let (reporter, _reports) = match_reporter::channel();
        AppState::new(AppConfig::default(), reporter)
    }

    async fn open_room(state: &SharedState) -> (Client, String) {
        let mut host = Client::connect(state, Some("ada"));
        assert_eq!(
            host.send(r#"{"type":"create_room"}"#).await,
            Flow::Continue
        );
        let events = host.events();
        assert_eq!(events[0]["type"], "room_joined");
        assert_eq!(events[0]["playerIndex"], 0);
        assert_eq!(events[1]["type"], "state");
        assert_eq!(events[1]["state"]["players"][0]["nickname"], "ada");
        let code = events[0]["roomCode"].as_str().unwrap().to_owned();
        (host, code)
    }

    fn join_frame(code: &str) -> String {
        format!(r#"{{"type":"join_room","roomCode":"{code}"}}"#)
    }

    #[tokio::test(start_paused = true)]
    async fn second_player_joins_and_starts_the_match() {
        let state = state();
        let (host, code) = open_room(&state).await;
        let mut guest = Client::connect(&state, Some("bob"));

        assert_eq!(guest.send(&join_frame(&code)).await, Flow::Continue);
        let events = guest.events();
        assert_eq!(events[0]["type"], "room_joined");
        assert_eq!(events[0]["roomCode"], code.as_str());
        assert_eq!(events[0]["playerIndex"], 1);
        assert_eq!(guest.session.slot(), Some(Slot::Right));
        assert_eq!(host.session.slot(), Some(Slot::Left));

        let room = state.rooms().get_room(&code).unwrap();
        assert!(room.lock().await.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn message_nickname_overrides_query_nickname() {
        let state = state();
        let mut client = Client::connect(&state, Some("query"));
        client
            .send(r#"{"type":"create_room","nickname":"chosen"}"#)
            .await;
        let events = client.events();
        assert_eq!(events[1]["state"]["players"][0]["nickname"], "chosen");
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_room_is_rejected_and_closes() {
        let state = state();
        let mut client = Client::connect(&state, None);

        assert_eq!(client.send(&join_frame("ffffff")).await, Flow::Close);
        assert_eq!(client.last_error().as_deref(), Some("Room not found"));
        assert!(client.session.room_code().is_none());
        assert!(state.rooms().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn third_player_is_turned_away() {
        let state = state();
        let (_host, code) = open_room(&state).await;
        let mut guest = Client::connect(&state, None);
        guest.send(&join_frame(&code)).await;

        let mut late = Client::connect(&state, None);
        assert_eq!(late.send(&join_frame(&code)).await, Flow::Close);
        assert_eq!(late.last_error().as_deref(), Some("Room is full"));
        let room = state.rooms().get_room(&code).unwrap();
        assert_eq!(room.lock().await.occupant_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bound_connection_cannot_switch_rooms() {
        let state = state();
        let (mut host, _code) = open_room(&state).await;

        assert_eq!(host.send(r#"{"type":"create_room"}"#).await, Flow::Close);
        assert_eq!(host.last_error().as_deref(), Some("Already in a room"));
        assert_eq!(state.rooms().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_room_request_while_bound_reports_already_in_room() {
        let state = state();
        let (mut host, code) = open_room(&state).await;

        assert_eq!(host.send(r#"{"type":"join_room"}"#).await, Flow::Close);
        assert_eq!(host.last_error().as_deref(), Some("Already in a room"));
        assert_eq!(host.session.room_code().map(|code| code.as_str()), Some(code.as_str()));
        assert_eq!(state.rooms().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_room_request_is_rejected() {
        let state = state();
        let mut client = Client::connect(&state, None);

        assert_eq!(
            client.send(r#"{"type":"join_room","roomCode":""}"#).await,
            Flow::Close
        );
        assert!(client.last_error().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_and_unbound_input_are_ignored() {
        let state = state();
        let mut client = Client::connect(&state, None);

        for frame in ["{", r#"{"type":"warp"}"#, r#"{"type":"input","dir":1}"#] {
            assert_eq!(client.send(frame).await, Flow::Continue);
        }
        assert!(client.events().is_empty());

        assert_eq!(client.send(r#"{"type":"ping"}"#).await, Flow::Continue);
        assert_eq!(client.events()[0]["type"], "pong");
    }

    #[tokio::test(start_paused = true)]
    async fn input_is_stored_for_the_next_tick() {
        let state = state();
        let (mut host, code) = open_room(&state).await;
        host.send(r#"{"type":"input","dir":1}"#).await;

        let room = state.rooms().get_room(&code).unwrap();
        let mut room = room.lock().await;
        let before = room.state().players[0].y;
        let (reporter, _reports) = match_reporter::channel();
        room.advance(&reporter);
        assert!(room.state().players[0].y > before);
    }

    #[tokio::test(start_paused = true)]
    async fn tournament_players_converge_on_one_room() {
        let state = state();
        let frame = r#"{"type":"join_tournament_match","tournamentId":3,"matchId":"sf-1"}"#;
        let mut first = Client::connect(&state, Some("ada"));
        let mut second = Client::connect(&state, Some("bob"));

        assert_eq!(first.send(frame).await, Flow::Continue);
        assert_eq!(second.send(frame).await, Flow::Continue);
        assert_eq!(first.events()[0]["roomCode"], "tournament-3-sf-1");
        assert_eq!(second.events()[0]["playerIndex"], 1);
        assert_eq!(state.rooms().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn departures_notify_then_remove_the_room() {
        let state = state();
        let (mut host, code) = open_room(&state).await;
        let mut guest = Client::connect(&state, None);
        guest.send(&join_frame(&code)).await;
        guest.events();

        host.session.close().await;
        let notices = guest
            .events()
            .into_iter()
            .filter(|event| event["type"] == "opponent_left")
            .count();
        assert_eq!(notices, 1);
        let room = state.rooms().get_room(&code).unwrap();
        assert!(!room.lock().await.is_ticking());

        guest.session.close().await;
        assert!(!state.rooms().contains(&code));
        assert!(room.lock().await.is_retired());

        guest.session.close().await;
        assert_eq!(guest.send(r#"{"type":"ping"}"#).await, Flow::Close);
    }
}
