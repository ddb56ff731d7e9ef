use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::GameType,
    dto::{
        format_system_time,
        sse::{MatchFinishedEvent, MatchPlayer, ServerEvent, SystemStatus},
    },
    services::match_reporter::{MatchKind, MatchReport},
    state::{AppState, simulation::Slot},
};

const EVENT_MATCH_FINISHED: &str = "match_finished";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Announce a decisive result to match stream subscribers.
pub fn broadcast_match_finished(state: &AppState, report: &MatchReport) {
    let (game_type, tournament_id, match_id) = match report.kind() {
        MatchKind::Casual => (GameType::Casual, None, None),
        MatchKind::Tournament {
            tournament_id,
            match_id,
        } => (GameType::Tournament, Some(tournament_id), Some(match_id)),
    };

    let payload = MatchFinishedEvent {
        room_code: report.room_code.to_string(),
        game_type,
        tournament_id,
        match_id,
        players: Slot::ALL.map(|slot| MatchPlayer {
            user_id: report.players[slot.index()].user_id,
            nickname: report.nickname(slot),
            score: report.scores[slot.index()],
        }),
        winner: report.winner,
        duration_seconds: report.duration_seconds(),
        ended_at: format_system_time(report.ended_at),
    };
    send_match_event(state, EVENT_MATCH_FINISHED, &payload);
}

/// Announce that match persistence became unavailable or recovered.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    send_match_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_match_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => {
            state.match_events().broadcast(event);
        }
        Err(err) => warn!(event, error = %err, "failed to serialize match SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use serde_json::Value;

    use super::*;
    use crate::{
        config::AppConfig,
        services::match_reporter::{self, ReportedPlayer},
        state::room_code::RoomCode,
    };

    #[test]
    fn match_finished_carries_bracket_ids_and_default_names() {
        let (reporter, _reports) = match_reporter::channel();
        let state = AppState::new(AppConfig::default(), reporter);
        let mut events = state.match_events().subscribe();

        let started_at = SystemTime::UNIX_EPOCH;
        broadcast_match_finished(
            &state,
            &MatchReport {
                room_code: RoomCode::tournament(8, "qf-2"),
                players: [
                    ReportedPlayer {
                        user_id: Some(4),
                        nickname: Some("ada".into()),
                    },
                    ReportedPlayer {
                        user_id: None,
                        nickname: None,
                    },
                ],
                scores: [13, 11],
                winner: Slot::Left,
                started_at,
                ended_at: started_at + Duration::from_secs(300),
            },
        );

        let event = events.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some("match_finished"));
        let data: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data["room_code"], "tournament-8-qf-2");
        assert_eq!(data["game_type"], "tournament");
        assert_eq!(data["tournament_id"], 8);
        assert_eq!(data["match_id"], "qf-2");
        assert_eq!(data["players"][0]["score"], 13);
        assert_eq!(data["players"][1]["nickname"], "Player 2");
        assert_eq!(data["winner"], 0);
        assert_eq!(data["duration_seconds"], 300);
        assert_eq!(data["ended_at"], "1970-01-01T00:05:00Z");
    }

    #[test]
    fn system_status_reports_flag() {
        let (reporter, _reports) = match_reporter::channel();
        let state = AppState::new(AppConfig::default(), reporter);
        let mut events = state.match_events().subscribe();

        broadcast_system_status(&state, true);
        let event = events.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some("system_status"));
        assert_eq!(event.data, r#"{"degraded":true}"#);
    }
}
