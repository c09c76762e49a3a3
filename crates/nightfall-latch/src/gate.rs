//! The shared flag that latches flip and parties wait on.

use std::time::Duration;

use tokio::sync::watch;

use crate::GateError;

/// Lifecycle of a [`Gate`].
///
/// ```text
/// Closed ──open()──→ Open ──close()──→ Closed
///    │                 │
///    └──break_gate()───┴──→ Broken   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Closed,
    Open,
    Broken,
}

/// A shared open/closed flag backed by a `tokio::sync::watch` channel.
///
/// Waiters never poll: [`GateWatch::opened`] parks the task until the state
/// leaves `Closed`. Opening or closing an already-open or already-closed
/// gate is a no-op and wakes nobody. Once broken, a gate stays broken.
#[derive(Debug)]
pub struct Gate {
    name: &'static str,
    tx: watch::Sender<GateState>,
}

impl Gate {
    /// Creates a closed gate.
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(GateState::Closed);
        Self { name, tx }
    }

    /// Opens the gate, releasing every waiter.
    pub fn open(&self) {
        let changed = self.tx.send_if_modified(|state| {
            if *state == GateState::Closed {
                *state = GateState::Open;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(gate = self.name, "gate opened");
        }
    }

    /// Closes an open gate.
    pub fn close(&self) {
        let changed = self.tx.send_if_modified(|state| {
            if *state == GateState::Open {
                *state = GateState::Closed;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(gate = self.name, "gate closed");
        }
    }

    /// Breaks the gate for good. Every current and future waiter gets
    /// [`GateError::Broken`].
    pub fn break_gate(&self) {
        self.tx.send_if_modified(|state| {
            if *state == GateState::Broken {
                false
            } else {
                *state = GateState::Broken;
                true
            }
        });
    }

    pub fn state(&self) -> GateState {
        *self.tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == GateState::Open
    }

    /// Takes a watch on the gate.
    ///
    /// Take it while still holding the lock under which you arrived at the
    /// latch, then release the lock and await it.
    pub fn watch(&self) -> GateWatch {
        GateWatch {
            name: self.name,
            rx: self.tx.subscribe(),
        }
    }
}

/// A pending wait on a [`Gate`], detached from any lock.
#[derive(Debug)]
pub struct GateWatch {
    name: &'static str,
    rx: watch::Receiver<GateState>,
}

impl GateWatch {
    /// Resolves once the gate is open (immediately if it already is).
    ///
    /// # Errors
    /// [`GateError::Broken`] if the gate is or becomes broken.
    pub async fn opened(mut self) -> Result<(), GateError> {
        let state = match self.rx.wait_for(|s| *s != GateState::Closed).await {
            Ok(state) => *state,
            // Sender dropped: the owning session is gone.
            Err(_) => GateState::Broken,
        };

        match state {
            GateState::Open => Ok(()),
            _ => Err(GateError::Broken(self.name)),
        }
    }

    /// Like [`opened`](Self::opened), but gives up after `limit` when one is
    /// set. `None` waits forever.
    ///
    /// # Errors
    /// [`GateError::TimedOut`] when the limit elapses first.
    pub async fn opened_within(
        self,
        limit: Option<Duration>,
    ) -> Result<(), GateError> {
        let name = self.name;
        match limit {
            None => self.opened().await,
            Some(after) => tokio::time::timeout(after, self.opened())
                .await
                .map_err(|_| GateError::TimedOut { gate: name, after })?,
        }
    }
}
