//! One match: simulation state, its two player slots and the tick handle.

use std::{sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
    },
    task::AbortHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::RoomError,
    services::match_reporter::{MatchReport, ReportedPlayer, ReporterHandle},
    state::{
        geometry::Geometry,
        room_code::RoomCode,
        simulation::{Direction, SimulationState, Slot},
    },
};

/// Identifier of one WebSocket connection.
pub type ConnectionId = Uuid;

/// Room guarded for exclusive access by sessions and its tick loop.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Frames buffered per connection before new ones are skipped, about one
/// second of state broadcasts.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Writer side of a connection, feeding its dedicated socket writer task.
///
/// The queue is bounded: a client that stops reading misses frames instead
/// of growing the queue. Every state frame supersedes the previous one.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

impl Outbound {
    /// Wrap the sender half of a channel drained by a socket writer.
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    /// Serialize and queue an event. Returns `false` once the writer is gone.
    pub fn send(&self, message: &ServerMessage<'_>) -> bool {
        match message.to_frame() {
            Ok(frame) => self.send_frame(frame),
            Err(err) => {
                warn!(error = %err, "failed to serialize outbound message");
                true
            }
        }
    }

    /// Queue a frame without waiting. A full queue skips the frame and still
    /// counts as delivered; only a closed writer returns `false`.
    fn send_frame(&self, frame: Message) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("outbound queue full; skipping frame for slow client");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Cancels the room's tick task when stopped or dropped.
#[derive(Debug)]
pub struct TickHandle(AbortHandle);

impl TickHandle {
    /// Take ownership of the tick task's abort handle.
    pub fn new(handle: AbortHandle) -> Self {
        Self(handle)
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A connection asking for a slot in a room.
#[derive(Debug)]
pub struct Seat {
    /// Connection that will own the slot.
    pub connection: ConnectionId,
    /// Display name; clients fall back to `Player N` when absent.
    pub nickname: Option<String>,
    /// Account credited in the persisted result.
    pub user_id: Option<i64>,
    /// Where the room pushes events for this connection.
    pub outbound: Outbound,
}

#[derive(Debug)]
struct Occupant {
    id: ConnectionId,
    slot: Slot,
    direction: Direction,
    user_id: Option<i64>,
    outbound: Outbound,
}

/// What happened to a room after a connection detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The connection was not bound to this room.
    NotPresent,
    /// Nobody is left; the room must be removed from the registry.
    Emptied,
    /// The match was abandoned and the remaining player was told.
    OpponentNotified,
    /// The match had already concluded; the remaining player stays.
    Remaining,
}

/// Result of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// A decisive point was scored; the tick loop must stop.
    Concluded,
}

/// Server-side state of one live or recently concluded match.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    instance: Uuid,
    state: SimulationState,
    occupants: Vec<Occupant>,
    tick: Option<TickHandle>,
    game_ended: bool,
    retired: bool,
    started_at: SystemTime,
}

impl Room {
    /// Empty room with a fresh simulation on `geometry`.
    pub fn new(code: RoomCode, geometry: &Geometry) -> Self {
        Self {
            code,
            instance: Uuid::new_v4(),
            state: SimulationState::new(geometry),
            occupants: Vec::with_capacity(2),
            tick: None,
            game_ended: false,
            retired: false,
            started_at: SystemTime::now(),
        }
    }

    /// Code under which the room is registered.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Distinguishes successive rooms registered under the same code.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Current simulation snapshot.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Mutable access to the simulation, for tooling and tests.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// Number of bound connections, at most two.
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Slot held by a connection, if it is bound here.
    pub fn slot_of(&self, connection: ConnectionId) -> Option<Slot> {
        self.occupant(connection).map(|occupant| occupant.slot)
    }

    /// Whether a decisive point has been scored.
    pub fn is_game_ended(&self) -> bool {
        self.game_ended
    }

    /// Whether a tick loop is attached.
    pub fn is_ticking(&self) -> bool {
        self.tick.is_some()
    }

    /// Whether the room was removed from the registry.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// True when two players are bound, the match is open and no loop runs yet.
    pub fn should_tick(&self) -> bool {
        self.occupants.len() == 2 && !self.game_ended && self.tick.is_none() && !self.retired
    }

    /// Store the handle of a freshly spawned tick loop.
    pub fn attach_tick(&mut self, handle: TickHandle) {
        if self.tick.replace(handle).is_some() {
            warn!(room = %self.code, "replaced a running tick loop");
        }
    }

    /// Cancel the tick loop, if any. Returns whether one was running.
    pub fn stop_ticking(&mut self) -> bool {
        match self.tick.take() {
            Some(handle) => {
                drop(handle);
                debug!(room = %self.code, "tick loop stopped");
                true
            }
            None => false,
        }
    }

    /// Mark the room as no longer reachable through the registry.
    pub fn retire(&mut self) {
        self.stop_ticking();
        self.retired = true;
    }

    /// Bind a connection to the lowest free slot.
    ///
    /// On success the joiner receives `room_joined` followed by the current
    /// state so it can render a consistent first frame. A concluded room
    /// accepts nobody new.
    pub fn join(&mut self, seat: Seat) -> Result<Slot, RoomError> {
        if self.retired {
            return Err(RoomError::RoomNotFound(self.code.to_string()));
        }
        if self.game_ended {
            return Err(RoomError::MatchFinished(self.code.to_string()));
        }

        let slot = Slot::ALL
            .into_iter()
            .find(|slot| self.occupants.iter().all(|occupant| occupant.slot != *slot))
            .ok_or_else(|| RoomError::RoomFull(self.code.to_string()))?;

        if self.occupants.is_empty() {
            self.started_at = SystemTime::now();
        }
        self.state.player_mut(slot).nickname = seat.nickname;

        seat.outbound.send(&ServerMessage::RoomJoined {
            room_code: self.code.as_str(),
            player_index: slot,
        });
        seat.outbound.send(&ServerMessage::State { state: &self.state });

        self.occupants.push(Occupant {
            id: seat.connection,
            slot,
            direction: Direction::Idle,
            user_id: seat.user_id,
            outbound: seat.outbound,
        });

        info!(
            room = %self.code,
            %slot,
            occupants = self.occupants.len(),
            "player joined room"
        );
        Ok(slot)
    }

    /// Record the latest direction requested by a bound connection.
    ///
    /// The value is consumed by the next tick, not applied immediately.
    pub fn set_direction(&mut self, connection: ConnectionId, direction: Direction) -> bool {
        match self.occupant_mut(connection) {
            Some(occupant) => {
                occupant.direction = direction;
                true
            }
            None => false,
        }
    }

    /// Detach a connection and stop the loop now that fewer than two remain.
    pub fn leave(&mut self, connection: ConnectionId) -> LeaveOutcome {
        let Some(position) = self
            .occupants
            .iter()
            .position(|occupant| occupant.id == connection)
        else {
            return LeaveOutcome::NotPresent;
        };

        let occupant = self.occupants.remove(position);
        self.stop_ticking();
        info!(room = %self.code, slot = %occupant.slot, "player left room");

        if self.occupants.is_empty() {
            LeaveOutcome::Emptied
        } else if self.game_ended {
            LeaveOutcome::Remaining
        } else {
            self.broadcast(&ServerMessage::OpponentLeft);
            LeaveOutcome::OpponentNotified
        }
    }

    /// Run one tick: physics, scoring, and the state broadcast.
    ///
    /// Once the match has ended this only re-broadcasts the frozen state.
    pub fn advance(&mut self, reporter: &ReporterHandle) -> TickOutcome {
        if self.game_ended {
            self.broadcast_state();
            return TickOutcome::Continue;
        }

        let directions = self.directions();
        let mut outcome = TickOutcome::Continue;
        if let Some(scorer) = self.state.step(directions) {
            debug!(room = %self.code, %scorer, scores = ?self.state.scores(), "goal");
            if let Some(winner) = self.state.award_point(scorer) {
                self.conclude(winner, reporter);
                outcome = TickOutcome::Concluded;
            }
        }

        self.broadcast_state();
        outcome
    }

    fn conclude(&mut self, winner: Slot, reporter: &ReporterHandle) {
        self.game_ended = true;
        self.stop_ticking();

        let scores = self.state.scores();
        let winner_score = scores[winner.index()];
        let loser_score = scores[winner.opponent().index()];
        info!(
            room = %self.code,
            %winner,
            winner_score,
            loser_score,
            "match concluded"
        );

        reporter.submit(self.report(winner));
        self.broadcast(&ServerMessage::GameWon {
            winner,
            winner_score,
            loser_score,
        });
    }

    fn report(&self, winner: Slot) -> MatchReport {
        let players = Slot::ALL.map(|slot| ReportedPlayer {
            user_id: self
                .occupants
                .iter()
                .find(|occupant| occupant.slot == slot)
                .and_then(|occupant| occupant.user_id),
            nickname: self.state.player(slot).nickname.clone(),
        });

        MatchReport {
            room_code: self.code.clone(),
            players,
            scores: self.state.scores(),
            winner,
            started_at: self.started_at,
            ended_at: SystemTime::now(),
        }
    }

    fn directions(&self) -> [Option<Direction>; 2] {
        let mut directions = [None; 2];
        for occupant in &self.occupants {
            directions[occupant.slot.index()] = Some(occupant.direction);
        }
        directions
    }

    fn broadcast_state(&self) {
        self.broadcast(&ServerMessage::State { state: &self.state });
    }

    /// Serialize once and queue the frame for every occupant.
    pub fn broadcast(&self, message: &ServerMessage<'_>) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(room = %self.code, error = %err, "failed to serialize broadcast");
                return;
            }
        };

        for occupant in &self.occupants {
            if !occupant.outbound.send_frame(frame.clone()) {
                debug!(room = %self.code, slot = %occupant.slot, "writer closed; frame dropped");
            }
        }
    }

    fn occupant(&self, connection: ConnectionId) -> Option<&Occupant> {
        self.occupants
            .iter()
            .find(|occupant| occupant.id == connection)
    }

    fn occupant_mut(&mut self, connection: ConnectionId) -> Option<&mut Occupant> {
        self.occupants
            .iter_mut()
            .find(|occupant| occupant.id == connection)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::services::match_reporter::{self, MatchKind, ReportReceiver};

    struct Client {
        id: ConnectionId,
        rx: mpsc::Receiver<Message>,
    }

    impl Client {
        fn events(&mut self) -> Vec<Value> {
            let mut events = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                if let Message::Text(text) = frame {
                    events.push(serde_json::from_str(text.as_str()).unwrap());
                }
            }
            events
        }

        fn count(&mut self, kind: &str) -> usize {
            self.events()
                .iter()
                .filter(|event| event["type"] == kind)
                .count()
        }
    }

    fn seat(nickname: &str, user_id: Option<i64>) -> (Seat, Client) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let id = Uuid::new_v4();
        let seat = Seat {
            connection: id,
            nickname: Some(nickname.to_owned()),
            user_id,
            outbound: Outbound::new(tx),
        };
        (seat, Client { id, rx })
    }

    fn full_room(code: &str) -> (Room, Client, Client) {
        let mut room = Room::new(RoomCode::from(code), &Geometry::default());
        let (first, a) = seat("ada", Some(7));
        let (second, b) = seat("bob", None);
        room.join(first).unwrap();
        room.join(second).unwrap();
        (room, a, b)
    }

    fn reporter() -> (ReporterHandle, ReportReceiver) {
        match_reporter::channel()
    }

    fn score_next_tick(room: &mut Room, scorer: Slot) {
        let state = room.state_mut();
        state.active = true;
        state.ball.dy = 0.0;
        state.ball.y = state.height / 2.0;
        match scorer {
            Slot::Left => {
                state.ball.dx = 1.0;
                state.ball.x = state.width - state.line_width;
            }
            Slot::Right => {
                state.ball.dx = -1.0;
                state.ball.x = state.line_width;
            }
        }
    }

    #[test]
    fn joiners_get_slots_in_order_and_a_first_frame() {
        let (room, mut a, mut b) = full_room("abc123");
        assert_eq!(room.slot_of(a.id), Some(Slot::Left));
        assert_eq!(room.slot_of(b.id), Some(Slot::Right));
        assert_eq!(room.state().players[0].nickname.as_deref(), Some("ada"));

        let events = a.events();
        assert_eq!(events[0]["type"], "room_joined");
        assert_eq!(events[0]["roomCode"], "abc123");
        assert_eq!(events[0]["playerIndex"], 0);
        assert_eq!(events[1]["type"], "state");
        assert_eq!(b.events()[0]["playerIndex"], 1);
    }

    #[test]
    fn third_join_is_rejected_without_touching_slots() {
        let (mut room, a, b) = full_room("abc123");
        let (third, mut c) = seat("cy", None);

        let err = room.join(third).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.occupant_count(), 2);
        assert_eq!(room.slot_of(a.id), Some(Slot::Left));
        assert_eq!(room.slot_of(b.id), Some(Slot::Right));
        assert!(c.events().is_empty());
    }

    #[test]
    fn rejoin_takes_the_slot_that_was_freed() {
        let (mut room, a, b) = full_room("abc123");
        room.leave(a.id);
        let (again, c) = seat("cy", None);
        assert_eq!(room.join(again).unwrap(), Slot::Left);
        assert_eq!(room.slot_of(b.id), Some(Slot::Right));
        assert_eq!(room.slot_of(c.id), Some(Slot::Left));
    }

    #[test]
    fn input_is_applied_on_the_next_tick_only() {
        let (mut room, a, _b) = full_room("abc123");
        let (reporter, _reports) = reporter();
        let before = room.state().players[0].y;

        assert!(room.set_direction(a.id, Direction::Down));
        assert_eq!(room.state().players[0].y, before);

        room.advance(&reporter);
        assert!(room.state().players[0].y > before);
        assert!(room.state().active);
    }

    #[test]
    fn every_tick_broadcasts_state_to_both_players() {
        let (mut room, mut a, mut b) = full_room("abc123");
        let (reporter, _reports) = reporter();
        a.events();
        b.events();

        for _ in 0..3 {
            room.advance(&reporter);
        }
        assert_eq!(a.count("state"), 3);
        assert_eq!(b.count("state"), 3);
    }

    #[test]
    fn decisive_goal_reports_once_and_freezes() {
        let (mut room, mut a, mut b) = full_room("tournament-3-final");
        let (reporter, mut reports) = reporter();
        room.state_mut().players[0].score = 10;
        room.state_mut().players[1].score = 9;
        a.events();
        b.events();

        score_next_tick(&mut room, Slot::Left);
        assert_eq!(room.advance(&reporter), TickOutcome::Concluded);
        assert!(room.is_game_ended());

        let events = a.events();
        let won: Vec<_> = events.iter().filter(|e| e["type"] == "game_won").collect();
        assert_eq!(won.len(), 1);
        assert_eq!(won[0]["winner"], 0);
        assert_eq!(won[0]["winnerScore"], 11);
        assert_eq!(won[0]["loserScore"], 9);
        assert_eq!(b.count("game_won"), 1);

        let report = reports.try_recv().unwrap();
        assert_eq!(report.winner, Slot::Left);
        assert_eq!(report.scores, [11, 9]);
        assert_eq!(report.players[0].user_id, Some(7));
        assert_eq!(report.players[1].user_id, None);
        assert_eq!(
            report.kind(),
            MatchKind::Tournament {
                tournament_id: 3,
                match_id: "final".into()
            }
        );

        let frozen = room.state().clone();
        assert_eq!(room.advance(&reporter), TickOutcome::Continue);
        assert_eq!(room.state(), &frozen);
        assert_eq!(a.count("state"), 1);
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn eleven_ten_keeps_playing() {
        let (mut room, _a, _b) = full_room("abc123");
        let (reporter, mut reports) = reporter();
        room.state_mut().players[0].score = 10;
        room.state_mut().players[1].score = 10;

        score_next_tick(&mut room, Slot::Left);
        assert_eq!(room.advance(&reporter), TickOutcome::Continue);
        assert_eq!(room.state().scores(), [11, 10]);
        assert!(!room.is_game_ended());
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn leaving_mid_match_notifies_the_other_player_once() {
        let (mut room, a, mut b) = full_room("abc123");
        b.events();

        assert_eq!(room.leave(a.id), LeaveOutcome::OpponentNotified);
        assert_eq!(b.count("opponent_left"), 1);
        assert_eq!(room.leave(a.id), LeaveOutcome::NotPresent);
        assert_eq!(room.leave(b.id), LeaveOutcome::Emptied);
    }

    #[test]
    fn leaving_after_the_result_is_silent() {
        let (mut room, a, mut b) = full_room("abc123");
        let (reporter, _reports) = reporter();
        room.state_mut().players[1].score = 10;
        score_next_tick(&mut room, Slot::Right);
        room.advance(&reporter);
        b.events();

        assert_eq!(room.leave(a.id), LeaveOutcome::Remaining);
        assert_eq!(b.count("opponent_left"), 0);
    }

    #[test]
    fn concluded_room_refuses_a_replacement_player() {
        let (mut room, a, mut b) = full_room("abc123");
        let (reporter, _reports) = reporter();
        room.state_mut().players[1].score = 10;
        score_next_tick(&mut room, Slot::Right);
        room.advance(&reporter);
        room.leave(a.id);
        b.events();

        let (late, mut c) = seat("cy", None);
        assert!(matches!(room.join(late), Err(RoomError::MatchFinished(_))));
        assert_eq!(room.occupant_count(), 1);
        assert!(c.events().is_empty());
        assert!(b.events().is_empty());
    }

    #[test]
    fn stalled_client_queue_stays_bounded() {
        let (mut room, _a, mut b) = full_room("abc123");
        let (reporter, _reports) = reporter();

        // A minute of ticks while nobody reads.
        for _ in 0..3_600 {
            room.advance(&reporter);
        }
        assert_eq!(b.rx.len(), OUTBOUND_CAPACITY);

        // Draining frees room for the next frame again.
        b.events();
        room.advance(&reporter);
        assert_eq!(b.count("state"), 1);
        assert_eq!(room.occupant_count(), 2);
    }

    #[test]
    fn closed_writer_does_not_disturb_the_other_player() {
        let (mut room, a, mut b) = full_room("abc123");
        let (reporter, _reports) = reporter();
        drop(a);
        b.events();

        room.advance(&reporter);
        assert_eq!(b.count("state"), 1);
    }

    #[test]
    fn retired_room_refuses_new_players() {
        let mut room = Room::new(RoomCode::from("abc123"), &Geometry::default());
        room.retire();
        let (late, _c) = seat("cy", None);
        assert!(matches!(room.join(late), Err(RoomError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn stopping_the_tick_aborts_the_task() {
        let (mut room, _a, _b) = full_room("abc123");
        let task = tokio::spawn(std::future::pending::<()>());
        room.attach_tick(TickHandle::new(task.abort_handle()));
        assert!(room.is_ticking());
        assert!(!room.should_tick());

        assert!(room.stop_ticking());
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(room.should_tick());
    }
}
