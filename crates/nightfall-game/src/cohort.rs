//! Cohort validation and session id derivation.

use std::collections::HashSet;

use nightfall_protocol::{PlayerName, SessionId, COHORT_SIZE};

use crate::GameError;

/// Session ids stay within the integer range a JavaScript client can hold
/// exactly (`Number.MAX_SAFE_INTEGER`).
const SESSION_ID_MASK: u64 = (1 << 53) - 1;

/// Four distinct players in canonical (lexicographic) order.
///
/// Slot `i` of a session is `cohort.players()[i]`. Because the order is
/// canonical, every member of the cohort ends up with the same slots, the
/// same session id and the same roles, whatever order they listed each
/// other in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cohort([PlayerName; COHORT_SIZE]);

impl Cohort {
    /// Validates the cohort that `player` submitted with `StartGame` and
    /// puts it in canonical order.
    ///
    /// # Errors
    /// [`GameError::InvalidCohort`] unless `cohort` is exactly four
    /// distinct, non-empty names that include `player`.
    pub fn canonical(
        player: &PlayerName,
        cohort: &[PlayerName],
    ) -> Result<Self, GameError> {
        if cohort.len() != COHORT_SIZE {
            return Err(GameError::InvalidCohort(format!(
                "expected {COHORT_SIZE} players, got {}",
                cohort.len()
            )));
        }

        if cohort.iter().any(PlayerName::is_empty) {
            return Err(GameError::InvalidCohort("empty player name".into()));
        }

        let distinct: HashSet<&PlayerName> = cohort.iter().collect();
        if distinct.len() != COHORT_SIZE {
            return Err(GameError::InvalidCohort("duplicate player name".into()));
        }

        if !distinct.contains(player) {
            return Err(GameError::InvalidCohort(format!(
                "{player} is not part of the cohort"
            )));
        }

        let mut players: [PlayerName; COHORT_SIZE] = cohort
            .to_vec()
            .try_into()
            .map_err(|_| GameError::InvalidCohort("cohort size changed".into()))?;
        players.sort();

        Ok(Self(players))
    }

    /// The players in slot order.
    pub fn players(&self) -> &[PlayerName; COHORT_SIZE] {
        &self.0
    }

    /// The session id every member of this cohort derives.
    pub fn session_id(&self) -> SessionId {
        derive_session_id(&self.0)
    }

    pub fn into_players(self) -> [PlayerName; COHORT_SIZE] {
        self.0
    }
}

/// Derives a session id from players in canonical order.
///
/// Each name is fed to BLAKE3 as its byte length (u64, little-endian)
/// followed by its UTF-8 bytes, so `["ab", "c"]` and `["a", "bc"]` hash
/// differently. The first 8 bytes of the digest, read little-endian and
/// masked to 53 bits, are the id.
pub fn derive_session_id(players: &[PlayerName; COHORT_SIZE]) -> SessionId {
    let mut hasher = blake3::Hasher::new();
    for name in players {
        let bytes = name.as_str().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);

    SessionId(u64::from_le_bytes(head) & SESSION_ID_MASK)
}
