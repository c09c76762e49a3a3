//! Vote resolution and win detection.
//!
//! Both are pure functions over the fixed slot tables, so they are tested
//! here without any concurrency.

use nightfall_protocol::{Faction, Role, COHORT_SIZE};

use crate::{Slot, SlotSet};

/// Per-candidate vote counts for the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally([u32; COHORT_SIZE]);

impl VoteTally {
    pub fn add(&mut self, candidate: Slot) {
        self.0[candidate.index()] += 1;
    }

    pub fn count(&self, candidate: Slot) -> u32 {
        self.0[candidate.index()]
    }

    pub fn clear(&mut self) {
        self.0 = [0; COHORT_SIZE];
    }

    /// The executed candidate, if the vote has a unique leader.
    pub fn winner(&self) -> Option<Slot> {
        plurality(&self.0).and_then(Slot::new)
    }
}

/// Plurality with tie-to-none over `counts`, scanned left to right.
///
/// The scan tracks a running leader and a running maximum (starting at 0):
/// a count above the maximum takes the lead; a count equal to the maximum
/// clears the leader without lowering the maximum. A later, larger count can
/// still take the lead after a tie. Zero counts never lead, so an all-abstain
/// vote executes nobody.
pub fn plurality(counts: &[u32]) -> Option<usize> {
    let mut max = 0;
    let mut leader = None;

    for (index, &votes) in counts.iter().enumerate() {
        if votes > max {
            max = votes;
            leader = Some(index);
        } else if votes == max {
            leader = None;
        }
    }

    leader
}

/// Decides whether either side has won.
///
/// Civilians win as soon as the Mafia is eliminated. Otherwise the Mafia
/// wins once at most one of the three non-Mafia players is still alive.
pub fn winner(roles: &[Role; COHORT_SIZE], alive: &SlotSet) -> Option<Faction> {
    let mut others_left = COHORT_SIZE - 1;

    for slot in Slot::ALL {
        let dead = !alive.contains(slot);
        if roles[slot.index()] == Role::Mafia {
            if dead {
                return Some(Faction::Civilians);
            }
        } else if dead {
            others_left -= 1;
        }
    }

    (others_left <= 1).then_some(Faction::Mafia)
}
