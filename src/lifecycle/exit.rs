//! Exit animation.
//!
//! Per-entity state machine for user-confirmed deletion:
//!
//! ```text
//! steady -> confirming -> exiting -> deleting -> (removed | steady)
//!              |
//!              +-> steady (cancelled)
//! ```
//!
//! `exiting` and `deleting` together form the Exiting set: the entity is
//! render-locked from confirmation until the delete call settles.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::state::{EntityId, TimerPhase};
use super::timers::TimerRegistry;

/// Exit progress for one entity. Absent means steady.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// A confirmation prompt is open.
    Confirming,
    /// Exit animation playing.
    Exiting {
        /// When the user confirmed.
        since: Instant,
    },
    /// Animation finished; delete call in flight.
    Deleting {
        /// When the user confirmed.
        since: Instant,
        /// When the delete call was issued.
        issued_at: Instant,
    },
}

/// Exit animator.
#[derive(Debug)]
pub struct ExitAnimator {
    settle: Duration,
    states: HashMap<EntityId, ExitState>,
}

impl ExitAnimator {
    /// Creates an animator whose exit animation lasts `settle`.
    #[must_use]
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            states: HashMap::new(),
        }
    }

    /// Opens a confirmation prompt for `id`.
    ///
    /// Ignored if `id` already has a prompt open or is exiting.
    pub fn request(&mut self, id: &EntityId) -> bool {
        if let Some(state) = self.states.get(id) {
            debug!(%id, ?state, "delete request ignored");
            return false;
        }
        self.states.insert(id.clone(), ExitState::Confirming);
        true
    }

    /// Closes the prompt for `id` without side effects.
    pub fn cancel(&mut self, id: &EntityId) -> bool {
        if self.states.get(id) == Some(&ExitState::Confirming) {
            self.states.remove(id);
            true
        } else {
            false
        }
    }

    /// Confirms the delete: joins the Exiting set and schedules the
    /// exit-settle timer.
    ///
    /// Only valid from `Confirming`; a second confirmation is a no-op.
    pub fn confirm(&mut self, id: &EntityId, now: Instant, timers: &mut TimerRegistry) -> bool {
        match self.states.get(id) {
            Some(ExitState::Confirming) => {
                self.states
                    .insert(id.clone(), ExitState::Exiting { since: now });
                timers.schedule(id.clone(), TimerPhase::ExitSettle, self.settle);
                true
            }
            state => {
                debug!(%id, ?state, "confirmation ignored");
                false
            }
        }
    }

    /// Applies the exit-settle timer. Returns `true` if the delete call
    /// should now be issued.
    pub fn on_settle(&mut self, id: &EntityId, now: Instant) -> bool {
        let Some(ExitState::Exiting { since }) = self.state(id) else {
            return false;
        };
        self.states.insert(
            id.clone(),
            ExitState::Deleting {
                since,
                issued_at: now,
            },
        );
        true
    }

    /// Leaves the Exiting set once the delete call settles, whatever its
    /// outcome. Returns `false` if `id` had no delete in flight.
    pub fn settle_delete(&mut self, id: &EntityId) -> bool {
        if matches!(self.states.get(id), Some(ExitState::Deleting { .. })) {
            self.states.remove(id);
            true
        } else {
            false
        }
    }

    /// Forgets `id` entirely (entity vanished).
    pub fn forget(&mut self, id: &EntityId) {
        self.states.remove(id);
    }

    /// Clears all exit bookkeeping.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Returns the exit progress for `id`.
    #[must_use]
    pub fn state(&self, id: &EntityId) -> Option<ExitState> {
        self.states.get(id).copied()
    }

    /// Returns whether a confirmation prompt is open for `id`.
    #[must_use]
    pub fn is_confirming(&self, id: &EntityId) -> bool {
        self.states.get(id) == Some(&ExitState::Confirming)
    }

    /// Returns when `id` joined the Exiting set, if it is a member.
    #[must_use]
    pub fn exiting_since(&self, id: &EntityId) -> Option<Instant> {
        match self.states.get(id)? {
            ExitState::Exiting { since } | ExitState::Deleting { since, .. } => Some(*since),
            ExitState::Confirming => None,
        }
    }

    /// Returns whether `id` is in the Exiting set.
    #[must_use]
    pub fn is_exiting(&self, id: &EntityId) -> bool {
        self.exiting_since(id).is_some()
    }

    /// Members of the Exiting set.
    #[must_use]
    pub fn exiting(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .states
            .keys()
            .filter(|id| self.is_exiting(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn cancel_returns_to_steady() {
        let mut exit = ExitAnimator::new(Duration::from_millis(400));
        assert!(exit.request(&id("A")));
        assert!(exit.is_confirming(&id("A")));
        assert!(!exit.is_exiting(&id("A")));
        assert!(exit.cancel(&id("A")));
        assert_eq!(exit.state(&id("A")), None);
        assert!(!exit.cancel(&id("A")));
    }

    #[test]
    fn confirm_without_prompt_is_ignored() {
        let mut exit = ExitAnimator::new(Duration::from_millis(400));
        let mut timers = TimerRegistry::new();
        assert!(!exit.confirm(&id("A"), Instant::now(), &mut timers));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_schedules_single_timer() {
        let mut exit = ExitAnimator::new(Duration::from_millis(400));
        let mut timers = TimerRegistry::new();
        exit.request(&id("A"));
        assert!(exit.confirm(&id("A"), Instant::now(), &mut timers));
        assert!(!exit.confirm(&id("A"), Instant::now(), &mut timers));
        assert!(!exit.request(&id("A")));
        assert!(!exit.cancel(&id("A")));
        assert_eq!(timers.len(), 1);
        assert!(exit.is_exiting(&id("A")));
        assert_eq!(exit.exiting(), vec![id("A")]);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_then_delete_outcome() {
        let mut exit = ExitAnimator::new(Duration::from_millis(400));
        let mut timers = TimerRegistry::new();
        let start = Instant::now();
        exit.request(&id("A"));
        exit.confirm(&id("A"), start, &mut timers);

        let fired = timers.next_expired().await.unwrap();
        assert_eq!(fired.phase, TimerPhase::ExitSettle);
        assert!(Instant::now() - start >= Duration::from_millis(400));

        assert!(exit.on_settle(&id("A"), Instant::now()));
        assert!(!exit.on_settle(&id("A"), Instant::now()));
        assert!(exit.is_exiting(&id("A")));
        assert_eq!(exit.exiting_since(&id("A")), Some(start));

        assert!(exit.settle_delete(&id("A")));
        assert!(!exit.is_exiting(&id("A")));
        assert!(!exit.settle_delete(&id("A")));
    }

    #[test]
    fn settle_without_exit_is_ignored() {
        let mut exit = ExitAnimator::new(Duration::from_millis(400));
        assert!(!exit.on_settle(&id("A"), Instant::now()));
        exit.request(&id("A"));
        assert!(!exit.on_settle(&id("A"), Instant::now()));
    }
}
