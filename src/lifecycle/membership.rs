//! Membership tracking.
//!
//! Keeps the snapshot of entity IDs recorded at the end of the previous
//! reconciliation pass and classifies each new observation against it.

use indexmap::IndexSet;

use super::state::EntityId;

/// Result of comparing two roster snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// IDs present now but not in the previous snapshot, in current order.
    pub appeared: Vec<EntityId>,
    /// IDs in the previous snapshot that are no longer present, in previous order.
    pub vanished: Vec<EntityId>,
}

impl RosterDiff {
    /// Returns `true` if nothing appeared or vanished.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.vanished.is_empty()
    }
}

/// Computes `{appeared, vanished}` between two snapshots.
#[must_use]
pub fn diff(prev: &IndexSet<EntityId>, curr: &IndexSet<EntityId>) -> RosterDiff {
    RosterDiff {
        appeared: curr.difference(prev).cloned().collect(),
        vanished: prev.difference(curr).cloned().collect(),
    }
}

/// Tracks the previous-snapshot set.
///
/// The first observation only seeds the snapshot: members that exist when
/// the roster is bootstrapped are never reported as new. Every later pass
/// replaces the snapshot wholesale.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    snapshot: IndexSet<EntityId>,
    seeded: bool,
}

impl MembershipTracker {
    /// Creates an unseeded tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one reconciliation pass against `current`.
    pub fn observe(&mut self, current: IndexSet<EntityId>) -> RosterDiff {
        if !self.seeded {
            self.seeded = true;
            self.snapshot = current;
            return RosterDiff::default();
        }

        let result = diff(&self.snapshot, &current);
        self.snapshot = current;
        result
    }

    /// Returns the snapshot recorded by the last pass.
    #[must_use]
    pub const fn snapshot(&self) -> &IndexSet<EntityId> {
        &self.snapshot
    }

    /// Returns whether the tracker has observed at least one roster.
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Returns whether `id` was present at the last pass.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.snapshot.contains(id)
    }
}
