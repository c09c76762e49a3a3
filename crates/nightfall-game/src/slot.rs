//! Player slots: stable per-session indices 0..4.
//!
//! Every table in a session (roles, alive flags, vote counts) is a fixed
//! array indexed by [`Slot`], assigned once at creation in canonical cohort
//! order. Scans over these arrays are therefore reproducible, unlike scans
//! over a hash map.

use std::fmt;

use nightfall_protocol::COHORT_SIZE;

/// Index of a player within their session's cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(usize);

impl Slot {
    /// Every slot, in scan order.
    pub const ALL: [Slot; COHORT_SIZE] = [Slot(0), Slot(1), Slot(2), Slot(3)];

    /// Returns the slot for `index`, or `None` if it is out of range.
    pub fn new(index: usize) -> Option<Self> {
        (index < COHORT_SIZE).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A set of slots, stored as one flag per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotSet([bool; COHORT_SIZE]);

impl SlotSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All four slots.
    pub fn full() -> Self {
        Self([true; COHORT_SIZE])
    }

    /// Adds `slot`. Returns `false` if it was already present.
    pub fn insert(&mut self, slot: Slot) -> bool {
        !std::mem::replace(&mut self.0[slot.index()], true)
    }

    /// Removes `slot`. Returns `false` if it was already absent.
    pub fn remove(&mut self, slot: Slot) -> bool {
        std::mem::replace(&mut self.0[slot.index()], false)
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.0[slot.index()]
    }

    pub fn clear(&mut self) {
        self.0 = [false; COHORT_SIZE];
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|present| **present).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Members in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        Slot::ALL.into_iter().filter(|s| self.contains(*s))
    }
}

impl FromIterator<Slot> for SlotSet {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut set = Self::empty();
        for slot in iter {
            set.insert(slot);
        }
        set
    }
}
