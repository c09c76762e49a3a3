//! Wire protocol for Nightfall.
//!
//! This crate defines the "language" that players and the coordinator speak:
//!
//! - **Identity** ([`PlayerName`], [`SessionId`]) and game vocabulary
//!   ([`Role`], [`Faction`]) shared by every other crate.
//! - **Frames** ([`RequestFrame`], [`ResponseFrame`], [`Call`], [`Reply`]):
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the socket (raw bytes) and the session
//! engine (lobby, game sessions). It doesn't know about barriers or rounds;
//! it only knows how to serialize and deserialize calls.
//!
//! ```text
//! WebSocket (bytes) → Protocol (RequestFrame) → Service (lobby / session)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Call, Faction, PlayerName, Reply, RequestFrame, ResponseFrame, Role,
    RoleEntry, SessionId, COHORT_SIZE,
};
