//! Error types for the rendezvous primitives.

use std::time::Duration;

/// Errors returned while waiting on a [`Gate`](crate::Gate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The gate was broken while (or before) we waited. The owner breaks
    /// every gate when it gives up on a session.
    #[error("gate {0} is broken")]
    Broken(&'static str),

    /// The gate stayed closed for longer than the allowed wait.
    #[error("gate {gate} did not open within {after:?}")]
    TimedOut {
        gate: &'static str,
        after: Duration,
    },
}
