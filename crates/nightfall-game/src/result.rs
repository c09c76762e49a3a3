//! Reporting finished games.

use std::time::Duration;

use nightfall_protocol::{Faction, PlayerName, Role, SessionId};
use serde::Serialize;

/// How one player did in a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerOutcome {
    pub name: PlayerName,
    pub role: Role,
    pub won: bool,
}

/// Summary of a retired session, handed to a [`ResultSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameResult {
    pub session_id: SessionId,
    /// `None` if the game ended without a winner.
    pub winner: Option<Faction>,
    /// Time from session creation to retirement.
    pub duration: Duration,
    /// Completed nights.
    pub nights: u64,
    /// One entry per player, in slot order.
    pub players: Vec<PlayerOutcome>,
}

impl GameResult {
    /// Builds the outcome rows: a player won iff their role's faction is
    /// the winner.
    pub fn outcomes<'a>(
        players: impl IntoIterator<Item = (&'a PlayerName, Role)>,
        winner: Option<Faction>,
    ) -> Vec<PlayerOutcome> {
        players
            .into_iter()
            .map(|(name, role)| PlayerOutcome {
                name: name.clone(),
                role,
                won: winner == Some(role.faction()),
            })
            .collect()
    }
}

/// Receives every finished game exactly once, at retirement.
///
/// This is the seam for a profile or statistics store. Implementations are
/// called from inside a request task, so they should not block for long.
pub trait ResultSink: Send + Sync + 'static {
    fn record(&self, result: &GameResult);
}

/// The default sink: one log line per player.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogResultSink;

impl ResultSink for LogResultSink {
    fn record(&self, result: &GameResult) {
        for p in &result.players {
            tracing::info!(
                session_id = %result.session_id,
                player = %p.name,
                role = %p.role,
                won = p.won,
                duration_ms = result.duration.as_millis() as u64,
                "game result"
            );
        }
    }
}
