//! Game sessions for Nightfall.
//!
//! A game session owns one cohort of four players: who plays which role,
//! who is still alive, and the barrier choreography that keeps the four
//! players' independent calls in lock-step through night and day.
//!
//! # Key types
//!
//! - [`GameSession`]: the per-cohort state machine (night, vote, win check)
//! - [`SessionRegistry`]: maps a [`SessionId`](nightfall_protocol::SessionId)
//!   to its live session
//! - [`Cohort`]: a validated, canonically ordered set of four players
//! - [`GameConfig`]: round timeout
//! - [`ResultSink`]: where finished games are reported
//!
//! # Round
//!
//! ```text
//! QueryDayAction → (Inspect | RevealMafia | DesignateKill)? → WaitNight
//!      ↑                                                         │
//!      │                                                   CheckWinner
//!      │                                                         │
//!  CheckWinner ←──────────── Vote ←────────── QueryAlive ←───────┘
//! ```
//!
//! `WaitNight` and `Vote` are barriers: neither returns to anyone until all
//! four players have called it for the current round.

mod cohort;
mod config;
mod error;
mod registry;
mod result;
mod session;
mod slot;
mod tally;

pub use cohort::{derive_session_id, Cohort};
pub use config::{GameConfig, SessionStatus};
pub use error::GameError;
pub use registry::SessionRegistry;
pub use result::{GameResult, LogResultSink, PlayerOutcome, ResultSink};
pub use session::{GameSession, NightOutcome, RolesRead};
pub use slot::{Slot, SlotSet};
pub use tally::{plurality, winner, VoteTally};
