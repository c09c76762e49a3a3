//! Unified error type for the Nightfall server.

use nightfall_game::GameError;
use nightfall_lobby::LobbyError;
use nightfall_protocol::{ProtocolError, Reply};

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby call failed (empty name, leave without join).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A game call failed (unknown session, wrong role, violation, timeout).
    #[error(transparent)]
    Game(#[from] GameError),

    /// The WebSocket handshake or stream failed.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Binding or accepting on the listener failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NightfallError {
    /// HTTP-style status code for the error reply.
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Lobby(e) => e.code(),
            Self::Game(e) => e.code(),
            Self::WebSocket(_) | Self::Io(_) => 500,
        }
    }

    /// The error as sent back to the calling player.
    pub fn to_reply(&self) -> Reply {
        Reply::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}
