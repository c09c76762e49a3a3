//! Game configuration and session status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every game session the registry creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// How long one player may wait at a barrier (night or vote) for the
    /// other three.
    ///
    /// `None` (the default) waits forever: a player who never calls in
    /// stalls the session. With a limit, the first waiter to run out of
    /// patience abandons the session and every other waiter is released
    /// with an error.
    pub round_timeout: Option<Duration>,
}

impl GameConfig {
    /// A config that abandons sessions stuck for longer than `limit`.
    pub fn with_round_timeout(limit: Duration) -> Self {
        Self {
            round_timeout: Some(limit),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a game session.
///
/// ```text
/// InProgress ──(4th GetRoles)──→ Retired
///     │
///     └──(round timeout)──→ Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Players are still calling in.
    InProgress,
    /// All four players have read the final role table.
    Retired,
    /// A barrier timed out; every call fails from now on.
    Abandoned,
}

impl SessionStatus {
    /// Returns `true` if the session still accepts round calls.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Retired => write!(f, "Retired"),
            Self::Abandoned => write!(f, "Abandoned"),
        }
    }
}
