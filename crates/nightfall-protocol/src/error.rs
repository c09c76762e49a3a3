//! Error types for the protocol layer.
//!
//! Each crate in Nightfall defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or frame shape, not in
//! the lobby or a game session.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a frame).
    ///
    /// Common causes: malformed JSON, an unknown `op` tag, or a missing
    /// `session_id` on a session call.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but is invalid at the protocol level, e.g. an
    /// empty player name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
