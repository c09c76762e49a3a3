//! Matchmaking lobby for Nightfall.
//!
//! Players call [`Lobby::join`] and get back a stream of membership
//! snapshots. When the fourth player joins, the lobby seals that cohort and
//! starts a fresh, empty one; every stream in the sealed cohort yields the
//! final four-member snapshot and ends. The players then call `StartGame`
//! with that snapshot.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game Layer (above)   ← StartGame takes the cohort this crate produced
//!     ↕
//! Lobby Layer (this crate)  ← gathers four players
//!     ↕
//! Protocol / Latch (below)  ← PlayerName, hand-off Latch
//! ```

mod error;
mod lobby;

pub use error::LobbyError;
pub use lobby::{Lobby, LobbyStats, Membership};
