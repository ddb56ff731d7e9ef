use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

const TOURNAMENT_PREFIX: &str = "tournament-";

/// Identifier of a live room.
///
/// Free-play codes are six random hex digits. Tournament codes are derived from
/// the bracket coordinates (`tournament-{tournamentId}-{matchId}`) so both
/// participants converge on the same room without coordinating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Draw a fresh free-play code. Callers must check for collisions.
    pub fn random() -> Self {
        Self(format!("{:06x}", rand::random::<u32>() & 0x00ff_ffff))
    }

    /// Deterministic code of a tournament bracket match.
    pub fn tournament(tournament_id: i64, match_id: &str) -> Self {
        Self(format!("{TOURNAMENT_PREFIX}{tournament_id}-{match_id}"))
    }

    /// Tournament id and match id encoded in the code, if any.
    pub fn tournament_parts(&self) -> Option<(i64, &str)> {
        let rest = self.0.strip_prefix(TOURNAMENT_PREFIX)?;
        let (tournament_id, match_id) = rest.split_once('-')?;
        let tournament_id = tournament_id.parse().ok()?;
        (!match_id.is_empty()).then_some((tournament_id, match_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RoomCode {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for RoomCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_six_hex_digits() {
        for _ in 0..32 {
            let code = RoomCode::random();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().chars().all(|c| c.is_ascii_hexdigit()));
            assert_eq!(code.tournament_parts(), None);
        }
    }

    #[test]
    fn tournament_code_round_trips_ids() {
        let code = RoomCode::tournament(42, "r2-m1");
        assert_eq!(code.as_str(), "tournament-42-r2-m1");
        assert_eq!(code.tournament_parts(), Some((42, "r2-m1")));
    }

    #[test]
    fn tournament_prefix_without_numeric_id_is_casual() {
        assert_eq!(RoomCode::from("tournament-x-m1").tournament_parts(), None);
        assert_eq!(RoomCode::from("tournament-7-").tournament_parts(), None);
        assert_eq!(RoomCode::from("tournament-7").tournament_parts(), None);
    }
}
