//! The lobby: a process-wide waiting set that seals every four players
//! into a cohort.
//!
//! # Sealing
//!
//! The fourth `join` seals the cohort in the same critical section that
//! added the player: the final snapshot is published to that cohort's
//! channel and the waiting set is replaced by a fresh one with its own
//! channel. A fifth `join` therefore always lands in the next cohort, and
//! no stream ever sees more than four members.
//!
//! # Hand-off
//!
//! Each stream that yields its cohort's four-member snapshot arrives at
//! the cohort's hand-off [`Latch`]. The 4th arrival marks the cohort as
//! handed off. A stream dropped before it got that far releases its
//! member's place instead, so the cohort's hand-off entry is removed once
//! every member has either arrived or gone.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use nightfall_latch::Latch;
use nightfall_protocol::{PlayerName, COHORT_SIZE};
use tokio::sync::{watch, Mutex};

use crate::LobbyError;

/// A stream of membership snapshots for one joined player.
///
/// Yields whenever the membership differs from the last snapshot this
/// stream yielded. Ends after the four-member snapshot, or as soon as the
/// player is no longer a member (after `leave`).
pub type Membership = BoxStream<'static, Vec<PlayerName>>;

/// Point-in-time lobby counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbyStats {
    /// Players in the current waiting set.
    pub waiting: usize,
    /// Cohorts that reached four members.
    pub cohorts_sealed: u64,
    /// Sealed cohorts whose four streams have all seen the final snapshot.
    pub cohorts_handed_off: u64,
    /// Sealed cohorts still waiting on some member's stream.
    pub handoffs_pending: usize,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    sealed: u64,
    handed_off: u64,
}

fn handed_off(counters: &mut Counters, cohort: u64) {
    counters.handed_off += 1;
    tracing::info!(cohort, "cohort handed off");
}

/// The current, not yet sealed waiting set.
#[derive(Debug)]
struct Waiting {
    /// Sequence number of this cohort.
    cohort: u64,
    /// Members in join order.
    members: Vec<PlayerName>,
    tx: watch::Sender<Vec<PlayerName>>,
}

impl Waiting {
    fn new(cohort: u64) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            cohort,
            members: Vec::with_capacity(COHORT_SIZE),
            tx,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.members.clone());
    }
}

/// Hand-off bookkeeping for one sealed cohort.
#[derive(Debug)]
struct Handoff {
    latch: Latch<Counters, u64>,
    /// Members whose stream has neither reported nor been dropped.
    pending: Vec<PlayerName>,
}

#[derive(Debug)]
struct LobbyInner {
    waiting: Waiting,
    handoffs: HashMap<u64, Handoff>,
    counters: Counters,
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// The matchmaking lobby.
///
/// Cheap to clone: clones share the same waiting set.
#[derive(Debug, Clone)]
pub struct Lobby {
    inner: Arc<Mutex<LobbyInner>>,
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}

impl Lobby {
    /// Creates an empty lobby.
    pub fn new() -> Self {
        let inner = LobbyInner {
            waiting: Waiting::new(1),
            handoffs: HashMap::new(),
            counters: Counters::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Adds `player` to the waiting set and returns their membership
    /// stream.
    ///
    /// Joining while already waiting is a no-op that returns another
    /// stream over the same cohort.
    ///
    /// # Errors
    /// [`LobbyError::InvalidName`] for the empty name.
    pub async fn join(&self, player: PlayerName) -> Result<Membership, LobbyError> {
        if player.is_empty() {
            return Err(LobbyError::InvalidName);
        }

        let mut inner = self.inner.lock().await;
        let cohort = inner.waiting.cohort;
        let rx = inner.waiting.tx.subscribe();

        if inner.waiting.members.contains(&player) {
            tracing::debug!(%player, cohort, "already waiting");
        } else {
            inner.waiting.members.push(player.clone());
            inner.waiting.publish();
            tracing::debug!(%player, cohort, waiting = inner.waiting.members.len(), "player joined lobby");

            if inner.waiting.members.len() == COHORT_SIZE {
                inner.seal();
            }
        }

        Ok(watch_membership(Arc::clone(&self.inner), player, cohort, rx))
    }

    /// Removes `player` from the waiting set.
    ///
    /// # Errors
    /// [`LobbyError::NotWaiting`] if the player isn't in the current
    /// waiting set. A sealed cohort is unaffected.
    pub async fn leave(&self, player: &PlayerName) -> Result<(), LobbyError> {
        let mut inner = self.inner.lock().await;
        let waiting = &mut inner.waiting;

        let index = waiting
            .members
            .iter()
            .position(|m| m == player)
            .ok_or_else(|| LobbyError::NotWaiting(player.clone()))?;

        waiting.members.remove(index);
        waiting.publish();
        tracing::debug!(%player, cohort = waiting.cohort, waiting = waiting.members.len(), "player left lobby");
        Ok(())
    }

    /// Returns `true` if `player` is in the current waiting set.
    pub async fn is_waiting(&self, player: &PlayerName) -> bool {
        self.inner.lock().await.waiting.members.contains(player)
    }

    pub async fn stats(&self) -> LobbyStats {
        let inner = self.inner.lock().await;
        LobbyStats {
            waiting: inner.waiting.members.len(),
            cohorts_sealed: inner.counters.sealed,
            cohorts_handed_off: inner.counters.handed_off,
            handoffs_pending: inner.handoffs.len(),
        }
    }
}

impl LobbyInner {
    /// Closes the full waiting set and opens the next one.
    fn seal(&mut self) {
        let next = Waiting::new(self.waiting.cohort + 1);
        let sealed = std::mem::replace(&mut self.waiting, next);

        self.counters.sealed += 1;
        tracing::info!(cohort = sealed.cohort, members = ?sealed.members, "lobby sealed");

        self.handoffs.insert(
            sealed.cohort,
            Handoff {
                latch: Latch::new("handoff", COHORT_SIZE, handed_off),
                pending: sealed.members,
            },
        );
    }

    /// Records that `player`'s stream saw the final snapshot of `cohort`.
    fn report_handoff(&mut self, cohort: u64, player: &PlayerName) {
        if self.take_pending(cohort, player) {
            if let Some(handoff) = self.handoffs.get_mut(&cohort) {
                handoff.latch.arrive(&mut self.counters, cohort);
            }
            self.prune_handoff(cohort);
        }
    }

    /// Records that `player`'s stream was dropped before it reported.
    fn release_handoff(&mut self, cohort: u64, player: &PlayerName) {
        if self.take_pending(cohort, player) {
            tracing::debug!(%player, cohort, "membership stream dropped before hand-off");
            self.prune_handoff(cohort);
        }
    }

    fn take_pending(&mut self, cohort: u64, player: &PlayerName) -> bool {
        let Some(handoff) = self.handoffs.get_mut(&cohort) else {
            return false;
        };
        match handoff.pending.iter().position(|p| p == player) {
            Some(index) => {
                handoff.pending.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn prune_handoff(&mut self, cohort: u64) {
        if self
            .handoffs
            .get(&cohort)
            .is_some_and(|handoff| handoff.pending.is_empty())
        {
            self.handoffs.remove(&cohort);
        }
    }
}

// ---------------------------------------------------------------------------
// Membership stream
// ---------------------------------------------------------------------------

struct WatchState {
    lobby: Arc<Mutex<LobbyInner>>,
    player: PlayerName,
    cohort: u64,
    rx: watch::Receiver<Vec<PlayerName>>,
    last: Option<Vec<PlayerName>>,
    reported: bool,
}

/// Releases the player's hand-off place if the stream goes away before
/// yielding the final snapshot.
///
/// `Drop` is synchronous: the release happens inline when the lobby lock
/// is free and in a spawned task otherwise.
impl Drop for WatchState {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        let cohort = self.cohort;

        if let Ok(mut inner) = self.lobby.try_lock() {
            inner.release_handoff(cohort, &self.player);
            return;
        }

        let lobby = Arc::clone(&self.lobby);
        let player = self.player.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                lobby.lock().await.release_handoff(cohort, &player);
            });
        }
    }
}

fn watch_membership(
    lobby: Arc<Mutex<LobbyInner>>,
    player: PlayerName,
    cohort: u64,
    rx: watch::Receiver<Vec<PlayerName>>,
) -> Membership {
    let state = WatchState {
        lobby,
        player,
        cohort,
        rx,
        last: None,
        reported: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.reported {
            return None;
        }

        let mut closed = false;
        loop {
            let snapshot = st.rx.borrow_and_update().clone();

            if !snapshot.contains(&st.player) {
                // Left the lobby.
                return None;
            }

            if st.last.as_ref() != Some(&snapshot) {
                if snapshot.len() == COHORT_SIZE {
                    st.lobby.lock().await.report_handoff(st.cohort, &st.player);
                    st.reported = true;
                }
                st.last = Some(snapshot.clone());
                return Some((snapshot, st));
            }

            if closed {
                return None;
            }
            // A closed channel still holds its final value: look once more.
            if st.rx.changed().await.is_err() {
                closed = true;
            }
        }
    })
    .boxed()
}
