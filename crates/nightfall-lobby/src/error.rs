//! Error types for the lobby.

use nightfall_protocol::PlayerName;

/// Errors that can occur while waiting for a cohort.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The empty name is never a valid identity.
    #[error("player name must not be empty")]
    InvalidName,

    /// `Leave` from a player who isn't in the current waiting set, either
    /// because they never joined or because their cohort already sealed.
    #[error("player {0} is not waiting in the lobby")]
    NotWaiting(PlayerName),
}

impl LobbyError {
    /// HTTP-style status code sent back to the player.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidName => 400,
            Self::NotWaiting(_) => 404,
        }
    }
}
