// tracking.rs — Bitmask classification of pending-change state.
//
// TrackingState is a query filter over the change set, never stored on the
// entity itself. The flags combine with `|` so callers can ask for any
// subset of the three buckets in one call.

use std::fmt;
use std::ops::BitOr;

/// Pending-change classification flags.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TrackingState(u8);

impl TrackingState {
    /// Pending insert.
    pub const ADDED: Self = Self(1);
    /// Pending delete.
    pub const DELETED: Self = Self(2);
    /// Pending update.
    pub const MODIFIED: Self = Self(4);
    /// All three buckets.
    pub const ALL: Self = Self(1 | 2 | 4);

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TrackingState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ADDED) {
            names.push("ADDED");
        }
        if self.contains(Self::DELETED) {
            names.push("DELETED");
        }
        if self.contains(Self::MODIFIED) {
            names.push("MODIFIED");
        }
        if names.is_empty() {
            names.push("NONE");
        }
        write!(f, "TrackingState({})", names.join(" | "))
    }
}
