//! Core protocol types for Nightfall's wire format.
//!
//! Every type here either travels "on the wire" or is part of the shared
//! game vocabulary (roles, factions) that the lobby, the session engine and
//! the server all agree on.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Number of players in one cohort. Every barrier in a game session is
/// sized to this.
pub const COHORT_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity: an opaque, unique name.
///
/// There is no separate connection or account object: the name *is* the
/// identity, and it is used as a map key everywhere. `Ord` is derived so a
/// cohort can be put into canonical (lexicographic) order.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    /// Wraps a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty name, which is never a valid identity
    /// (on the wire an empty ballot means "abstain").
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for PlayerName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identifier of one game session.
///
/// Derived deterministically from the cohort (see
/// `nightfall_game::derive_session_id`), so all four players of a cohort
/// compute the same value independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// A player's secret role.
///
/// A cohort always holds exactly one `Mafia`, one `Detective` and two
/// `Civilian`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Mafia,
    Detective,
    Civilian,
}

impl Role {
    /// The role multiset dealt to every cohort, before shuffling.
    pub const DECK: [Role; COHORT_SIZE] =
        [Role::Mafia, Role::Detective, Role::Civilian, Role::Civilian];

    /// Whether this role gets a night action (inspect or kill).
    pub fn acts_at_night(self) -> bool {
        matches!(self, Role::Mafia | Role::Detective)
    }

    /// The faction this role plays for.
    pub fn faction(self) -> Faction {
        match self {
            Role::Mafia => Faction::Mafia,
            Role::Detective | Role::Civilian => Faction::Civilians,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Mafia => "Mafia",
            Role::Detective => "Detective",
            Role::Civilian => "Civilian",
        };
        f.write_str(name)
    }
}

/// The side that won a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Mafia,
    Civilians,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Mafia => f.write_str("Mafia"),
            Faction::Civilians => f.write_str("Civilians"),
        }
    }
}

/// One row of the role table revealed at the end of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub player: PlayerName,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Call: client → server
// ---------------------------------------------------------------------------

/// A remote call issued by a player.
///
/// `#[serde(tag = "op")]` produces internally tagged JSON:
///   `{ "op": "Vote", "session_id": 12, "player": "ann", "ballot": "bob" }`
///
/// Every call except `Join`, `Leave` and `StartGame` is addressed to a
/// running session by `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Call {
    // -- Lobby --

    /// Enter the waiting set; answered by a stream of `Lobby` replies
    /// ending with `LobbyClosed`.
    Join { player: PlayerName },

    /// Leave the waiting set before the cohort is sealed.
    Leave { player: PlayerName },

    // -- Session setup --

    /// Create (or find) the session for `cohort` and learn your role.
    StartGame {
        player: PlayerName,
        cohort: Vec<PlayerName>,
    },

    // -- Day / night --

    /// Does my role act tonight?
    QueryDayAction {
        session_id: SessionId,
        player: PlayerName,
    },

    /// Detective only: is `target` the Mafia?
    Inspect {
        session_id: SessionId,
        player: PlayerName,
        target: PlayerName,
    },

    /// Detective only: announce the Mafia to everyone at the end of the
    /// night.
    RevealMafia {
        session_id: SessionId,
        player: PlayerName,
    },

    /// Mafia only: choose tonight's victim.
    DesignateKill {
        session_id: SessionId,
        player: PlayerName,
        target: PlayerName,
    },

    /// Wait for all four players to finish the night.
    WaitNight {
        session_id: SessionId,
        player: PlayerName,
    },

    /// List the players still alive.
    QueryAlive {
        session_id: SessionId,
        player: PlayerName,
    },

    /// Cast a day ballot. A missing or empty ballot abstains.
    Vote {
        session_id: SessionId,
        player: PlayerName,
        #[serde(default)]
        ballot: Option<PlayerName>,
    },

    /// Has either side won yet?
    CheckWinner {
        session_id: SessionId,
        player: PlayerName,
    },

    /// Terminal read: reveal every role. The fourth caller retires the
    /// session.
    GetRoles {
        session_id: SessionId,
        player: PlayerName,
    },
}

impl Call {
    /// The player issuing this call.
    pub fn player(&self) -> &PlayerName {
        match self {
            Call::Join { player }
            | Call::Leave { player }
            | Call::StartGame { player, .. }
            | Call::QueryDayAction { player, .. }
            | Call::Inspect { player, .. }
            | Call::RevealMafia { player, .. }
            | Call::DesignateKill { player, .. }
            | Call::WaitNight { player, .. }
            | Call::QueryAlive { player, .. }
            | Call::Vote { player, .. }
            | Call::CheckWinner { player, .. }
            | Call::GetRoles { player, .. } => player,
        }
    }

    /// The operation name, for logs.
    pub fn op(&self) -> &'static str {
        match self {
            Call::Join { .. } => "Join",
            Call::Leave { .. } => "Leave",
            Call::StartGame { .. } => "StartGame",
            Call::QueryDayAction { .. } => "QueryDayAction",
            Call::Inspect { .. } => "Inspect",
            Call::RevealMafia { .. } => "RevealMafia",
            Call::DesignateKill { .. } => "DesignateKill",
            Call::WaitNight { .. } => "WaitNight",
            Call::QueryAlive { .. } => "QueryAlive",
            Call::Vote { .. } => "Vote",
            Call::CheckWinner { .. } => "CheckWinner",
            Call::GetRoles { .. } => "GetRoles",
        }
    }
}

// ---------------------------------------------------------------------------
// Reply: server → client
// ---------------------------------------------------------------------------

/// The server's answer to a [`Call`].
///
/// Each call gets exactly one reply, except `Join`, which gets one `Lobby`
/// reply per membership change and then `LobbyClosed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    /// Current waiting-set membership, in join order.
    Lobby { members: Vec<PlayerName> },

    /// The lobby stream is finished: the last `Lobby` reply held the
    /// full cohort.
    LobbyClosed,

    Left,

    GameStarted { session_id: SessionId, role: Role },

    DayAction { acts: bool },

    Inspected { is_mafia: bool },

    Revealed,

    KillDesignated,

    /// The night is over. `killed` is `None` if no kill was designated;
    /// `revealed_mafia` is set if the Detective published the Mafia.
    NightResolved {
        killed: Option<PlayerName>,
        revealed_mafia: Option<PlayerName>,
    },

    Alive { players: Vec<PlayerName> },

    /// The vote is over. `None` means nobody was executed (tie or
    /// all-abstain).
    Voted { executed: Option<PlayerName> },

    Winner { faction: Option<Faction> },

    Roles { roles: Vec<RoleEntry> },

    /// The call failed. `code` follows HTTP conventions (404 = unknown
    /// session or player, 409 = protocol violation, ...).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Client → server frame. `id` is chosen by the client and echoed on every
/// reply to the call, so several calls can be in flight on one socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub call: Call,
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub reply: Reply,
}

// =========================================================================
// Tests
// =========================================================================
