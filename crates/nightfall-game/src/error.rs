//! Error types for the game layer.

use nightfall_protocol::{PlayerName, Role, SessionId};

/// Errors that can occur while playing a game session.
///
/// None of these are retried by the engine; each one goes straight back to
/// the calling player.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No live session has this identifier (never created, or already
    /// retired).
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The name is not one of the session's four players.
    #[error("player {player} is not in session {session_id}")]
    PlayerNotFound {
        session_id: SessionId,
        player: PlayerName,
    },

    /// `StartGame` was called with something that isn't four distinct,
    /// non-empty names including the caller.
    #[error("invalid cohort: {0}")]
    InvalidCohort(String),

    /// The player tried an action reserved for another role.
    #[error("player {player} is {role} and cannot {action}")]
    WrongRole {
        player: PlayerName,
        role: Role,
        action: &'static str,
    },

    /// The call breaks the round protocol: a second arrival at the same
    /// barrier, a ballot for an eliminated player, an eliminated player
    /// acting. The call is not counted and the session is abandoned.
    #[error("protocol violation in session {session_id}: {reason}")]
    InvariantViolation {
        session_id: SessionId,
        reason: String,
    },

    /// This caller waited longer than the configured round timeout. The
    /// session is abandoned.
    #[error("session {session_id} timed out waiting at {gate}")]
    RoundTimeout {
        session_id: SessionId,
        gate: &'static str,
    },

    /// The session was abandoned after a round timeout or a protocol
    /// violation; nothing more can happen in it.
    #[error("session {0} was abandoned")]
    SessionAbandoned(SessionId),
}

impl GameError {
    /// HTTP-style status code sent back to the player.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidCohort(_) => 400,
            Self::WrongRole { .. } => 403,
            Self::SessionNotFound(_) | Self::PlayerNotFound { .. } => 404,
            Self::RoundTimeout { .. } => 408,
            Self::InvariantViolation { .. } => 409,
            Self::SessionAbandoned(_) => 410,
        }
    }

    /// Returns `true` if the session can't continue after this error and
    /// should be dropped from the registry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. }
                | Self::RoundTimeout { .. }
                | Self::SessionAbandoned(_)
        )
    }
}
