//! Migration lifecycle state
//!
//! State is a set of independent facts, not a single enum: a record can
//! legitimately be `Success` and `Missing` and `Future` at the same time.
//! `State` is a fixed-width bit set with named constants and accessor
//! predicates; the label list below is the canonical operator-visible order.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit-set of migration lifecycle facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u16);

impl State {
    /// No facts recorded yet
    pub const UNKNOWN: State = State(0);
    /// Not yet applied
    pub const PENDING: State = State(1 << 0);
    /// Last execution succeeded
    pub const SUCCESS: State = State(1 << 1);
    /// Excluded from migrate
    pub const IGNORED: State = State(1 << 2);
    /// A reverse script exists and rollback is currently reachable
    pub const AVAILABLE: State = State(1 << 3);
    /// Was applied, has since been rolled back
    pub const UNDONE: State = State(1 << 4);
    /// Ledger entry has no matching source script
    pub const MISSING: State = State(1 << 5);
    /// Last execution failed
    pub const FAILED: State = State(1 << 6);
    /// Applied checksum no longer matches the source script
    pub const FUTURE: State = State(1 << 7);
    /// Repeatable migration that is outdated and should be re-applied
    pub const OUTDATED: State = State(1 << 8);
    /// Repeatable migration already superseded by a newer one
    pub const SUPERSEDED: State = State(1 << 9);

    const LABELS: [(State, &'static str); 10] = [
        (State::PENDING, "Pending"),
        (State::SUCCESS, "Success"),
        (State::IGNORED, "Ignored"),
        (State::AVAILABLE, "Available"),
        (State::UNDONE, "Undone"),
        (State::MISSING, "Missing"),
        (State::FAILED, "Failed"),
        (State::FUTURE, "Future"),
        (State::OUTDATED, "Outdated"),
        (State::SUPERSEDED, "Superseded"),
    ];

    /// True when every flag in `other` is set.
    pub fn contains(&self, other: State) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set every flag in `other`.
    pub fn insert(&mut self, other: State) {
        self.0 |= other.0;
    }

    /// Clear every flag in `other`.
    pub fn remove(&mut self, other: State) {
        self.0 &= !other.0;
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }

    pub fn is_pending(&self) -> bool {
        self.contains(State::PENDING)
    }

    pub fn is_success(&self) -> bool {
        self.contains(State::SUCCESS)
    }

    pub fn is_ignored(&self) -> bool {
        self.contains(State::IGNORED)
    }

    pub fn is_available(&self) -> bool {
        self.contains(State::AVAILABLE)
    }

    pub fn is_undone(&self) -> bool {
        self.contains(State::UNDONE)
    }

    pub fn is_missing(&self) -> bool {
        self.contains(State::MISSING)
    }

    pub fn is_failed(&self) -> bool {
        self.contains(State::FAILED)
    }

    pub fn is_future(&self) -> bool {
        self.contains(State::FUTURE)
    }

    /// Canonical labels for the flags currently set, in display order.
    pub fn labels(&self) -> Vec<&'static str> {
        if self.is_unknown() {
            return vec!["Unknown"];
        }

        State::LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

impl BitOr for State {
    type Output = State;

    fn bitor(self, rhs: State) -> State {
        State(self.0 | rhs.0)
    }
}

impl BitOrAssign for State {
    fn bitor_assign(&mut self, rhs: State) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join(", "))
    }
}
