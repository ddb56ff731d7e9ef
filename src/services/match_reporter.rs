//! Hands finished matches from the tick loop to persistence, the tournament
//! service, and the match event stream without blocking gameplay.

use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::{info, warn};

#[cfg(feature = "tournament-webhook")]
use crate::services::tournament_notifier::TournamentNotifier;
use crate::{
    dao::models::{GameType, MatchRecordEntity},
    services::sse_events,
    state::{SharedState, room_code::RoomCode, simulation::Slot},
};

/// Identity of one side of a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedPlayer {
    /// Account id, absent for anonymous players.
    pub user_id: Option<i64>,
    /// Name chosen on join, if any.
    pub nickname: Option<String>,
}

/// Category of a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    /// Free-play room joined by code.
    Casual,
    /// Bracket match, identified by the ids encoded in the room code.
    Tournament { tournament_id: i64, match_id: String },
}

/// Outcome of a decisive match, emitted exactly once per room.
#[derive(Debug, Clone)]
pub struct MatchReport {
    /// Room the match was played in.
    pub room_code: RoomCode,
    /// Indexed by slot.
    pub players: [ReportedPlayer; 2],
    /// Final scores, indexed by slot.
    pub scores: [u32; 2],
    pub winner: Slot,
    /// When the first player joined the room.
    pub started_at: SystemTime,
    /// When the decisive point was scored.
    pub ended_at: SystemTime,
}

impl MatchReport {
    /// Casual or tournament, derived from the room code.
    pub fn kind(&self) -> MatchKind {
        match self.room_code.tournament_parts() {
            Some((tournament_id, match_id)) => MatchKind::Tournament {
                tournament_id,
                match_id: match_id.to_owned(),
            },
            None => MatchKind::Casual,
        }
    }

    /// Nickname shown for `slot`, falling back to `Player 1` / `Player 2`.
    pub fn nickname(&self, slot: Slot) -> String {
        self.players[slot.index()]
            .nickname
            .clone()
            .unwrap_or_else(|| format!("Player {}", slot.index() + 1))
    }

    pub fn duration_seconds(&self) -> u64 {
        self.ended_at
            .duration_since(self.started_at)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

impl From<&MatchReport> for MatchRecordEntity {
    fn from(report: &MatchReport) -> Self {
        let (game_type, tournament_id, match_id) = match report.kind() {
            MatchKind::Casual => (GameType::Casual, None, None),
            MatchKind::Tournament {
                tournament_id,
                match_id,
            } => (GameType::Tournament, Some(tournament_id), Some(match_id)),
        };

        Self {
            player1_id: report.players[0].user_id,
            player1_nickname: report.nickname(Slot::Left),
            player2_id: report.players[1].user_id,
            player2_nickname: report.nickname(Slot::Right),
            winner_id: report.players[report.winner.index()].user_id,
            winner_nickname: report.nickname(report.winner),
            player1_score: report.scores[0],
            player2_score: report.scores[1],
            game_type,
            tournament_id,
            match_id,
            started_at: report.started_at,
            ended_at: report.ended_at,
            duration_seconds: report.duration_seconds(),
        }
    }
}

/// Receiving end drained by [`run`].
pub type ReportReceiver = mpsc::UnboundedReceiver<MatchReport>;

/// Non-blocking submission side, cloned into every tick loop.
#[derive(Clone, Debug)]
pub struct ReporterHandle {
    tx: mpsc::UnboundedSender<MatchReport>,
}

impl ReporterHandle {
    /// Queue a report. Never blocks the caller.
    pub fn submit(&self, report: MatchReport) {
        let room = report.room_code.clone();
        if self.tx.send(report).is_err() {
            warn!(%room, "match reporter stopped; dropping match report");
        }
    }
}

/// Create the report queue.
pub fn channel() -> (ReporterHandle, ReportReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReporterHandle { tx }, rx)
}

/// Drain reports until every [`ReporterHandle`] is dropped.
pub async fn run(state: SharedState, mut reports: ReportReceiver) {
    #[cfg(feature = "tournament-webhook")]
    let notifier = state
        .config()
        .tournament_webhook()
        .and_then(|settings| match TournamentNotifier::new(settings) {
            Ok(notifier) => Some(notifier),
            Err(err) => {
                warn!(error = %err, "tournament notifier disabled");
                None
            }
        });

    while let Some(report) = reports.recv().await {
        persist(&state, &report).await;

        #[cfg(feature = "tournament-webhook")]
        if let Some(notifier) = notifier.as_ref() {
            notify_tournament(notifier, &report).await;
        }

        sse_events::broadcast_match_finished(&state, &report);
    }

    info!("match reporter stopped");
}

/// Store the finished match. Failures are logged and otherwise ignored.
async fn persist(state: &SharedState, report: &MatchReport) {
    let store = match state.match_store().await {
        Some(store) if !state.is_degraded() => Some(store),
        _ => None,
    };
    let Some(store) = store else {
        warn!(room = %report.room_code, "match store unavailable (degraded mode); match not recorded");
        return;
    };

    match store.record_match(MatchRecordEntity::from(report)).await {
        Ok(()) => info!(room = %report.room_code, "match recorded"),
        Err(err) => warn!(room = %report.room_code, error = %err, "failed to record match"),
    }
}

#[cfg(feature = "tournament-webhook")]
async fn notify_tournament(notifier: &TournamentNotifier, report: &MatchReport) {
    let MatchKind::Tournament {
        tournament_id,
        match_id,
    } = report.kind()
    else {
        return;
    };

    match notifier
        .submit_result(tournament_id, &match_id, report.winner, report.scores)
        .await
    {
        Ok(()) => info!(tournament_id, %match_id, "tournament result submitted"),
        Err(err) => warn!(
            tournament_id,
            %match_id,
            error = %err,
            "failed to submit tournament result"
        ),
    }
}
