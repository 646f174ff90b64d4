//! Timer registry.
//!
//! Owns every scheduled lifecycle callback, keyed by `(EntityId, TimerPhase)`.
//! Built on [`DelayQueue`]: a removed entry is never yielded, so once a
//! timer is cancelled its callback cannot run, even if its deadline has
//! already passed but it has not been polled yet.

use std::collections::HashMap;
use std::future::poll_fn;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;
use tracing::trace;

use crate::observability::metrics;

use super::state::{EntityId, TimerPhase};

/// A timer whose deadline elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    /// Entity the timer belongs to.
    pub id: EntityId,
    /// Phase the timer belongs to.
    pub phase: TimerPhase,
    /// Deadline the timer was scheduled for.
    pub deadline: Instant,
}

/// Single-handle-per-`(id, phase)` timer registry.
#[derive(Default)]
pub struct TimerRegistry {
    queue: DelayQueue<(EntityId, TimerPhase)>,
    live: HashMap<(EntityId, TimerPhase), Key>,
}

impl TimerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `phase` for `id` to fire after `delay`.
    ///
    /// Any live timer for the same `(id, phase)` is cancelled first.
    /// Returns `true` if an existing timer was replaced.
    pub fn schedule(&mut self, id: EntityId, phase: TimerPhase, delay: Duration) -> bool {
        let replaced = self.cancel(&id, phase);
        trace!(%id, %phase, delay_ms = delay.as_millis(), "timer scheduled");
        let key = self.queue.insert((id.clone(), phase), delay);
        self.live.insert((id, phase), key);
        metrics::set_live_timers(self.live.len());
        replaced
    }

    /// Cancels the live timer for `(id, phase)`, if any.
    pub fn cancel(&mut self, id: &EntityId, phase: TimerPhase) -> bool {
        let Some(key) = self.live.remove(&(id.clone(), phase)) else {
            return false;
        };
        self.queue.remove(&key);
        trace!(%id, %phase, "timer cancelled");
        metrics::record_timer_cancelled(phase);
        metrics::set_live_timers(self.live.len());
        true
    }

    /// Cancels each of `phases` for `id`. Returns how many were live.
    pub fn cancel_phases(&mut self, id: &EntityId, phases: &[TimerPhase]) -> usize {
        phases
            .iter()
            .filter(|&&phase| self.cancel(id, phase))
            .count()
    }

    /// Cancels every phase for `id`. Returns how many were live.
    pub fn cancel_all(&mut self, id: &EntityId) -> usize {
        self.cancel_phases(id, &TimerPhase::ALL)
    }

    /// Cancels every timer in the registry.
    pub fn clear(&mut self) {
        for (_, phase) in self.live.keys() {
            metrics::record_timer_cancelled(*phase);
        }
        self.queue.clear();
        self.live.clear();
        metrics::set_live_timers(0);
    }

    /// Returns whether a timer for `(id, phase)` is live.
    #[must_use]
    pub fn is_scheduled(&self, id: &EntityId, phase: TimerPhase) -> bool {
        self.live.contains_key(&(id.clone(), phase))
    }

    /// Returns the deadline of the live timer for `(id, phase)`.
    #[must_use]
    pub fn deadline(&self, id: &EntityId, phase: TimerPhase) -> Option<Instant> {
        self.live
            .get(&(id.clone(), phase))
            .map(|key| self.queue.deadline(key))
    }

    /// Returns the phases currently live for `id`.
    #[must_use]
    pub fn phases_for(&self, id: &EntityId) -> Vec<TimerPhase> {
        TimerPhase::ALL
            .into_iter()
            .filter(|&phase| self.is_scheduled(id, phase))
            .collect()
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no timers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Polls for the next expired timer.
    ///
    /// Returns `Poll::Ready(None)` when the registry is empty.
    pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<Option<FiredTimer>> {
        match self.queue.poll_expired(cx) {
            Poll::Ready(Some(expired)) => {
                let key = expired.key();
                let deadline = expired.deadline();
                let (id, phase) = expired.into_inner();
                let slot = (id.clone(), phase);
                if self.live.get(&slot) == Some(&key) {
                    self.live.remove(&slot);
                }
                metrics::set_live_timers(self.live.len());
                trace!(%id, %phase, "timer fired");
                Poll::Ready(Some(FiredTimer {
                    id,
                    phase,
                    deadline,
                }))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    /// Waits for the next expired timer.
    ///
    /// Cancel-safe: dropping the future loses no timer.
    pub async fn next_expired(&mut self) -> Option<FiredTimer> {
        poll_fn(|cx| self.poll_expired(cx)).await
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}
