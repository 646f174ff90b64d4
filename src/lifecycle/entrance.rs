//! Entrance animation.
//!
//! Plays exactly one entrance cycle for the entity the creation flow
//! designates as just created, provided the membership tracker reported it
//! as newly appeared. A cycle is three timers scheduled together:
//!
//! - `EntranceStart`: joins the Entering set after the pre-paint delay
//! - `EntranceSettle`: joins the Completed-entrance set
//! - `EntranceExpire`: leaves the Entering set
//!
//! Settle strictly precedes expire because their delays are validated as
//! strictly increasing.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::LifecycleConfig;

use super::state::{EntityId, TimerPhase};
use super::timers::TimerRegistry;

/// Entrance delays, measured from the moment the cycle is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntranceTimings {
    /// Delay before the entity joins the Entering set.
    pub start: Duration,
    /// Nominal entrance animation duration.
    pub settle: Duration,
    /// Settle plus the display buffer.
    pub expire: Duration,
}

impl EntranceTimings {
    /// Builds timings from a config, forcing `start <= settle < expire`.
    ///
    /// Validated configs pass through unchanged.
    #[must_use]
    pub fn from_config(config: &LifecycleConfig) -> Self {
        let settle = config.entrance_settle;
        let mut start = config.entrance_start;
        let mut expire = config.entrance_expire;

        if start > settle {
            warn!(?start, ?settle, "entrance_start exceeds entrance_settle; clamping");
            start = settle;
        }
        if expire <= settle {
            let clamped = settle + Duration::from_millis(1);
            warn!(?expire, ?clamped, "entrance_expire must exceed entrance_settle; clamping");
            expire = clamped;
        }

        Self {
            start,
            settle,
            expire,
        }
    }
}

/// Per-entity entrance progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntranceState {
    /// Triggered; waiting for the pre-paint delay.
    Pending {
        /// When the cycle was triggered.
        since: Instant,
    },
    /// In the Entering set.
    Entering {
        /// When the cycle was triggered.
        since: Instant,
    },
    /// In both the Entering and Completed-entrance sets.
    Settled {
        /// When the cycle was triggered.
        since: Instant,
    },
    /// Only in the Completed-entrance set.
    Completed,
}

impl EntranceState {
    const fn in_entering_set(self) -> bool {
        matches!(self, Self::Entering { .. } | Self::Settled { .. })
    }

    const fn in_completed_set(self) -> bool {
        matches!(self, Self::Settled { .. } | Self::Completed)
    }
}

/// What an entrance timer did when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntranceStep {
    /// Joined the Entering set.
    Started,
    /// Joined the Completed-entrance set.
    Settled,
    /// Left the Entering set.
    Expired,
}

/// Entrance animator.
#[derive(Debug)]
pub struct EntranceAnimator {
    timings: EntranceTimings,
    designated: Option<EntityId>,
    newly_appeared: IndexSet<EntityId>,
    states: HashMap<EntityId, EntranceState>,
}

impl EntranceAnimator {
    /// Creates an animator with the given timings.
    #[must_use]
    pub fn new(timings: EntranceTimings) -> Self {
        Self {
            timings,
            designated: None,
            newly_appeared: IndexSet::new(),
            states: HashMap::new(),
        }
    }

    /// Returns the current designated-new identifier.
    #[must_use]
    pub const fn designated(&self) -> Option<&EntityId> {
        self.designated.as_ref()
    }

    /// Records the IDs the latest reconciliation pass reported as new.
    pub fn publish_appeared(&mut self, appeared: &[EntityId]) {
        self.newly_appeared = appeared.iter().cloned().collect();
    }

    /// Replaces the designated-new identifier.
    ///
    /// When the designation changes, the previous entity's pending entrance
    /// timers are cancelled and any Entering membership it had is dropped.
    /// A previous entity that already settled keeps its completed class.
    /// The previous entity's creation counts as used: designating it again
    /// before it reappears does not start another cycle.
    /// Returns the superseded identifier, if any.
    pub fn designate(
        &mut self,
        next: Option<EntityId>,
        timers: &mut TimerRegistry,
    ) -> Option<EntityId> {
        if self.designated == next {
            return None;
        }

        let previous = std::mem::replace(&mut self.designated, next);
        if let Some(prev) = &previous {
            let cancelled = timers.cancel_phases(prev, &TimerPhase::ENTRANCE);
            self.retire(prev);
            self.newly_appeared.shift_remove(prev);
            debug!(id = %prev, cancelled, "designation superseded");
        }
        previous
    }

    /// Returns whether an entrance may start for `id` now.
    ///
    /// Requires `id` to be newly appeared and not already animating or
    /// completed.
    #[must_use]
    pub fn can_start(&self, id: &EntityId) -> bool {
        self.newly_appeared.contains(id) && !self.states.contains_key(id)
    }

    /// Starts an entrance cycle for `id`, scheduling all three timers.
    ///
    /// Callers check [`can_start`](Self::can_start) first.
    pub fn start(&mut self, id: &EntityId, now: Instant, timers: &mut TimerRegistry) {
        self.states
            .insert(id.clone(), EntranceState::Pending { since: now });
        timers.schedule(id.clone(), TimerPhase::EntranceStart, self.timings.start);
        timers.schedule(id.clone(), TimerPhase::EntranceSettle, self.timings.settle);
        timers.schedule(id.clone(), TimerPhase::EntranceExpire, self.timings.expire);
    }

    /// Applies a fired entrance timer.
    ///
    /// Returns `None` for timers that no longer match the entity's progress.
    pub fn on_timer(&mut self, id: &EntityId, phase: TimerPhase) -> Option<EntranceStep> {
        let state = self.states.get_mut(id)?;
        let (next, step) = match (phase, *state) {
            (TimerPhase::EntranceStart, EntranceState::Pending { since }) => {
                (EntranceState::Entering { since }, EntranceStep::Started)
            }
            (
                TimerPhase::EntranceSettle,
                EntranceState::Pending { since } | EntranceState::Entering { since },
            ) => (EntranceState::Settled { since }, EntranceStep::Settled),
            (TimerPhase::EntranceExpire, EntranceState::Settled { .. }) => {
                (EntranceState::Completed, EntranceStep::Expired)
            }
            (
                TimerPhase::EntranceExpire,
                EntranceState::Pending { .. } | EntranceState::Entering { .. },
            ) => {
                warn!(%id, "entrance expired before settling");
                (EntranceState::Completed, EntranceStep::Expired)
            }
            (phase, current) => {
                debug!(%id, %phase, ?current, "ignoring stale entrance timer");
                return None;
            }
        };
        *state = next;
        Some(step)
    }

    /// Ends any entrance for `id` because its exit started.
    ///
    /// The entity keeps only the completed class, so a failed delete that
    /// returns it to steady cannot replay the entrance. The caller cancels
    /// the entrance timers.
    pub fn abort(&mut self, id: &EntityId) {
        if let Some(state) = self.states.get_mut(id) {
            *state = EntranceState::Completed;
        }
    }

    /// Forgets `id` entirely (entity vanished).
    pub fn forget(&mut self, id: &EntityId) {
        self.states.remove(id);
        self.newly_appeared.shift_remove(id);
    }

    /// Clears all entrance bookkeeping. The designation is kept.
    pub fn clear(&mut self) {
        self.states.clear();
        self.newly_appeared.clear();
    }

    /// Returns the entrance progress for `id`.
    #[must_use]
    pub fn state(&self, id: &EntityId) -> Option<EntranceState> {
        self.states.get(id).copied()
    }

    /// Returns when the entrance was triggered, while `id` is in the
    /// Entering set.
    #[must_use]
    pub fn entering_since(&self, id: &EntityId) -> Option<Instant> {
        match self.states.get(id)? {
            EntranceState::Entering { since } | EntranceState::Settled { since } => Some(*since),
            EntranceState::Pending { .. } | EntranceState::Completed => None,
        }
    }

    /// Returns whether `id` is in the Entering set.
    #[must_use]
    pub fn is_entering(&self, id: &EntityId) -> bool {
        self.states
            .get(id)
            .is_some_and(|state| state.in_entering_set())
    }

    /// Returns whether `id` is in the Completed-entrance set.
    #[must_use]
    pub fn is_completed(&self, id: &EntityId) -> bool {
        self.states
            .get(id)
            .is_some_and(|state| state.in_completed_set())
    }

    /// Members of the Entering set.
    #[must_use]
    pub fn entering(&self) -> Vec<EntityId> {
        self.collect(|state| state.in_entering_set())
    }

    /// Members of the Completed-entrance set.
    #[must_use]
    pub fn completed(&self) -> Vec<EntityId> {
        self.collect(|state| state.in_completed_set())
    }

    fn collect(&self, keep: impl Fn(EntranceState) -> bool) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .states
            .iter()
            .filter(|(_, state)| keep(**state))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Leaves only the completed class behind for `id`, if it earned one.
    fn retire(&mut self, id: &EntityId) {
        match self.states.get(id).copied() {
            Some(EntranceState::Settled { .. }) => {
                self.states.insert(id.clone(), EntranceState::Completed);
            }
            Some(EntranceState::Pending { .. } | EntranceState::Entering { .. }) => {
                self.states.remove(id);
            }
            Some(EntranceState::Completed) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> EntranceTimings {
        EntranceTimings {
            start: Duration::from_millis(16),
            settle: Duration::from_millis(500),
            expire: Duration::from_millis(2000),
        }
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn clamps_misordered_timings() {
        let config = LifecycleConfig {
            entrance_start: Duration::from_millis(900),
            entrance_settle: Duration::from_millis(500),
            entrance_expire: Duration::from_millis(400),
            ..LifecycleConfig::default()
        };
        let t = EntranceTimings::from_config(&config);
        assert_eq!(t.start, Duration::from_millis(500));
        assert_eq!(t.expire, Duration::from_millis(501));
    }

    #[test]
    fn default_config_passes_through() {
        let config = LifecycleConfig::default();
        let t = EntranceTimings::from_config(&config);
        assert_eq!(t.settle, config.entrance_settle);
        assert_eq!(t.expire, config.entrance_expire);
        assert_eq!(t.start, config.entrance_start);
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_newly_appeared() {
        let mut anim = EntranceAnimator::new(timings());
        assert!(!anim.can_start(&id("C")));
        anim.publish_appeared(&[id("C")]);
        assert!(anim.can_start(&id("C")));

        let mut timers = TimerRegistry::new();
        anim.start(&id("C"), Instant::now(), &mut timers);
        assert!(!anim.can_start(&id("C")));
        assert_eq!(timers.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_transitions() {
        let mut anim = EntranceAnimator::new(timings());
        let mut timers = TimerRegistry::new();
        anim.publish_appeared(&[id("C")]);
        anim.start(&id("C"), Instant::now(), &mut timers);

        assert!(!anim.is_entering(&id("C")));
        assert_eq!(anim.entering_since(&id("C")), None);

        let mut steps = Vec::new();
        while let Some(fired) = timers.next_expired().await {
            steps.push(anim.on_timer(&fired.id, fired.phase).unwrap());
            match steps.last().unwrap() {
                EntranceStep::Started => {
                    assert!(anim.is_entering(&id("C")));
                    assert!(!anim.is_completed(&id("C")));
                }
                EntranceStep::Settled => {
                    assert!(anim.is_entering(&id("C")));
                    assert!(anim.is_completed(&id("C")));
                }
                EntranceStep::Expired => {
                    assert!(!anim.is_entering(&id("C")));
                    assert!(anim.is_completed(&id("C")));
                }
            }
        }
        assert_eq!(
            steps,
            vec![
                EntranceStep::Started,
                EntranceStep::Settled,
                EntranceStep::Expired
            ]
        );
        assert_eq!(anim.state(&id("C")), Some(EntranceState::Completed));
        assert_eq!(anim.entering_since(&id("C")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_cancels_previous_timers() {
        let mut anim = EntranceAnimator::new(timings());
        let mut timers = TimerRegistry::new();
        anim.publish_appeared(&[id("C"), id("D")]);

        anim.designate(Some(id("C")), &mut timers);
        anim.start(&id("C"), Instant::now(), &mut timers);
        let previous = anim.designate(Some(id("D")), &mut timers);

        assert_eq!(previous, Some(id("C")));
        assert!(timers.phases_for(&id("C")).is_empty());
        assert_eq!(anim.state(&id("C")), None);
        assert_eq!(anim.designated(), Some(&id("D")));

        anim.designate(Some(id("C")), &mut timers);
        assert!(!anim.can_start(&id("C")), "superseded creation is used up");
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_after_settle_keeps_completed_class() {
        let mut anim = EntranceAnimator::new(timings());
        let mut timers = TimerRegistry::new();
        anim.publish_appeared(&[id("C")]);
        anim.designate(Some(id("C")), &mut timers);
        anim.start(&id("C"), Instant::now(), &mut timers);

        for _ in 0..2 {
            let fired = timers.next_expired().await.unwrap();
            anim.on_timer(&fired.id, fired.phase);
        }
        assert!(anim.is_completed(&id("C")));

        anim.designate(None, &mut timers);
        assert!(!anim.is_entering(&id("C")));
        assert!(anim.is_completed(&id("C")));
        assert!(timers.is_empty());
    }

    #[test]
    fn same_designation_is_not_a_change() {
        let mut anim = EntranceAnimator::new(timings());
        let mut timers = TimerRegistry::new();
        assert_eq!(anim.designate(Some(id("C")), &mut timers), None);
        assert_eq!(anim.designate(Some(id("C")), &mut timers), None);
        assert_eq!(anim.designated(), Some(&id("C")));
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut anim = EntranceAnimator::new(timings());
        assert_eq!(anim.on_timer(&id("Z"), TimerPhase::EntranceSettle), None);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_blocks_replay() {
        let mut anim = EntranceAnimator::new(timings());
        let mut timers = TimerRegistry::new();
        anim.publish_appeared(&[id("C")]);
        anim.start(&id("C"), Instant::now(), &mut timers);
        timers.cancel_phases(&id("C"), &TimerPhase::ENTRANCE);
        anim.abort(&id("C"));

        assert!(!anim.is_entering(&id("C")));
        assert!(!anim.can_start(&id("C")));
        anim.abort(&id("Z"));
        assert_eq!(anim.state(&id("Z")), None);
    }

    #[test]
    fn forget_clears_everything_for_id() {
        let mut anim = EntranceAnimator::new(timings());
        anim.publish_appeared(&[id("C")]);
        anim.states.insert(id("C"), EntranceState::Completed);
        anim.forget(&id("C"));
        assert_eq!(anim.state(&id("C")), None);
        assert!(!anim.newly_appeared.contains(&id("C")));
    }
}
