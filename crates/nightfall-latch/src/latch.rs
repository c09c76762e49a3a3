//! The N-party rendezvous latch.

/// Outcome of one [`Latch::arrive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Not everyone is here yet. `arrived` counts this call.
    Waiting { arrived: usize, target: usize },
    /// This call was the Nth: the callback ran with this call's payload
    /// and the counter is back at zero. `round` is 1 for the first
    /// completed round.
    Triggered { round: u64 },
}

impl Arrival {
    /// Returns `true` if this arrival ran the callback.
    pub fn is_trigger(self) -> bool {
        matches!(self, Arrival::Triggered { .. })
    }
}

/// A reusable N-party counting barrier.
///
/// Each [`arrive`](Self::arrive) increments a counter. When it reaches the
/// target, the counter resets to zero and the callback runs exactly once,
/// with the state it guards and the payload of the *triggering* call.
/// Payloads of the first N-1 callers are dropped on the floor; callers that
/// need the outcome must read the shared state afterwards.
///
/// The callback is a plain `fn` pointer, not a closure, so the latch can be
/// stored next to `S` without borrowing it:
///
/// ```rust
/// use nightfall_latch::{Arrival, Latch};
///
/// #[derive(Default)]
/// struct Tally { last: Option<&'static str>, rounds: u32 }
///
/// fn record(t: &mut Tally, who: &'static str) {
///     t.last = Some(who);
///     t.rounds += 1;
/// }
///
/// let mut latch = Latch::new("demo", 2, record as fn(&mut Tally, &'static str));
/// let mut tally = Tally::default();
///
/// assert!(!latch.arrive(&mut tally, "first").is_trigger());
/// assert_eq!(latch.arrive(&mut tally, "second"), Arrival::Triggered { round: 1 });
/// assert_eq!(tally.last, Some("second"));
/// ```
///
/// Not reentrant across overlapping rounds: a new round's first arrival is
/// only meaningful once the previous round's callback has run, which is
/// guaranteed when every arrival happens under the same lock.
pub struct Latch<S, A = ()> {
    name: &'static str,
    target: usize,
    arrived: usize,
    rounds: u64,
    on_trigger: fn(&mut S, A),
}

impl<S, A> Latch<S, A> {
    /// Creates a latch that fires `on_trigger` on every `target`-th arrival.
    ///
    /// A target of 0 would never fire; it is clamped to 1.
    pub fn new(name: &'static str, target: usize, on_trigger: fn(&mut S, A)) -> Self {
        let target = if target == 0 {
            tracing::warn!(latch = name, "latch target 0 would never fire, clamping to 1");
            1
        } else {
            target
        };

        Self {
            name,
            target,
            arrived: 0,
            rounds: 0,
            on_trigger,
        }
    }

    /// Registers one arrival. On the Nth, resets the count and runs the
    /// callback with `payload`.
    pub fn arrive(&mut self, state: &mut S, payload: A) -> Arrival {
        self.arrived += 1;

        if self.arrived < self.target {
            tracing::trace!(
                latch = self.name,
                arrived = self.arrived,
                target = self.target,
                "latch arrival"
            );
            return Arrival::Waiting {
                arrived: self.arrived,
                target: self.target,
            };
        }

        self.arrived = 0;
        self.rounds += 1;
        (self.on_trigger)(state, payload);
        tracing::debug!(latch = self.name, round = self.rounds, "latch triggered");

        Arrival::Triggered { round: self.rounds }
    }

    /// Arrivals so far in the current round.
    pub fn arrived(&self) -> usize {
        self.arrived
    }

    /// Number of arrivals that trigger the callback.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Completed rounds since construction.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S, A> std::fmt::Debug for Latch<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch")
            .field("name", &self.name)
            .field("arrived", &self.arrived)
            .field("target", &self.target)
            .field("rounds", &self.rounds)
            .finish()
    }
}
