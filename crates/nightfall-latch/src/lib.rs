//! Rendezvous primitives for Nightfall.
//!
//! Two small pieces that every phase of a game session is built from:
//!
//! - [`Latch`]: a reusable N-party counter. The Nth arrival runs a callback
//!   with *its own* payload only, then the counter resets for the next
//!   round.
//! - [`Gate`]: a shared open/closed flag that latch callbacks flip and
//!   that parties wait on without polling.
//!
//! # Shapes
//!
//! **Single-latch signal**: every party arrives, the Nth opens the gate,
//! every party waits for the gate.
//!
//! **Two-latch phase pair**: an *enter* latch opens the gate; after a party
//! observes the gate it arrives at an *exit* latch, whose Nth arrival closes
//! the gate again. The gate can't close under a party that hasn't seen it
//! open, and no party can re-enter before every peer has left.
//!
//! ```ignore
//! // Under the session lock:
//! enter.arrive(&mut round, ());
//! let watch = round.gate.watch();
//! drop(lock);
//!
//! watch.opened().await?;
//!
//! // Under the session lock again:
//! exit.arrive(&mut round, ());
//! ```
//!
//! # Locking
//!
//! Neither type locks anything. A [`Latch`] is plain data that lives beside
//! the state its callback mutates, behind the owner's mutex. A [`Gate`] is
//! internally synchronized (a `tokio::sync::watch` channel), so a
//! [`GateWatch`] taken under the lock can be awaited after the lock is
//! released.

mod error;
mod gate;
mod latch;

pub use error::GateError;
pub use gate::{Gate, GateState, GateWatch};
pub use latch::{Arrival, Latch};
