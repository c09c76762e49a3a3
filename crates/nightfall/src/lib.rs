//! # Nightfall
//!
//! Session synchronization server for four-player Mafia games.
//!
//! Four independent clients call in over WebSocket; Nightfall groups them
//! into a cohort in the lobby, deals roles, and keeps their calls in
//! lock-step through night and day with rendezvous latches, so that no
//! player sees a round's outcome before all four have acted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::prelude::*;
//!
//! # async fn run() -> Result<(), NightfallError> {
//! let server = NightfallServer::builder()
//!     .bind("0.0.0.0:50051")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod service;

pub use error::NightfallError;
pub use server::{NightfallServer, NightfallServerBuilder, ServerConfig};
pub use service::MafiaService;

/// Everything needed to run a server or write a client.
pub mod prelude {
    pub use crate::{
        MafiaService, NightfallError, NightfallServer, NightfallServerBuilder,
        ServerConfig,
    };
    pub use nightfall_game::{
        GameConfig, GameError, GameResult, LogResultSink, PlayerOutcome, ResultSink,
    };
    pub use nightfall_latch::{Gate, GateError, Latch};
    pub use nightfall_lobby::{LobbyError, LobbyStats};
    pub use nightfall_protocol::{
        Call, Codec, Faction, JsonCodec, PlayerName, Reply, RequestFrame,
        ResponseFrame, Role, RoleEntry, SessionId,
    };
}
