//! Roster lifecycle controller.
//!
//! `RosterController` composes the membership tracker, the entrance and
//! exit animators, and the timer registry over a [`RosterStore`]. All
//! state is owned by the controller and mutated only through `&mut self`:
//! user actions and reconciliation passes apply synchronously, and
//! [`next_event`](RosterController::next_event) is the single suspension
//! point where timers, delete calls, and background fetches resolve.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use indexmap::{IndexMap, IndexSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LifecycleConfig;
use crate::error::StoreError;
use crate::observability::events::{Event, EventEmitter, offset_ms};
use crate::observability::metrics::{self, DeleteOutcome};
use crate::store::{Entity, RosterStore};

use super::entrance::{EntranceAnimator, EntranceStep, EntranceTimings};
use super::exit::ExitAnimator;
use super::membership::{MembershipTracker, RosterDiff};
use super::state::{
    EntityId, LifecycleEvent, Notification, RenderedEntity, TimerPhase, VisualState,
};
use super::timers::{FiredTimer, TimerRegistry};

/// A settled store call.
enum StoreReply {
    Deleted {
        id: EntityId,
        result: Result<(), StoreError>,
    },
    Fetched {
        seq: u64,
        result: Result<Vec<Entity>, StoreError>,
    },
}

/// What woke the event loop.
enum Wake {
    Timer(FiredTimer),
    Store(StoreReply),
}

/// Lifecycle controller for one roster view.
pub struct RosterController {
    store: Arc<dyn RosterStore>,
    config: LifecycleConfig,
    membership: MembershipTracker,
    entrance: EntranceAnimator,
    exit: ExitAnimator,
    timers: TimerRegistry,
    /// Latest entity set, in store order.
    entities: IndexMap<EntityId, Entity>,
    /// Deleted by the store but still in the latest snapshot, keyed to the
    /// last fetch sequence issued before the delete settled.
    removed: HashMap<EntityId, u64>,
    inflight: FuturesUnordered<BoxFuture<'static, StoreReply>>,
    fetch_seq: u64,
    applied_seq: u64,
    notifications: Vec<Notification>,
    notification_seq: u64,
    backlog: VecDeque<LifecycleEvent>,
    emitter: Option<Arc<EventEmitter>>,
    origin: Instant,
}

impl RosterController {
    /// Creates a controller over `store`.
    ///
    /// Nothing is observed until the first [`refresh`](Self::refresh) or
    /// [`reconcile`](Self::reconcile); that first pass only seeds the
    /// membership snapshot.
    #[must_use]
    pub fn new(store: Arc<dyn RosterStore>, config: LifecycleConfig) -> Self {
        let timings = EntranceTimings::from_config(&config);
        let exit_settle = config.exit_settle;
        Self {
            store,
            config,
            membership: MembershipTracker::new(),
            entrance: EntranceAnimator::new(timings),
            exit: ExitAnimator::new(exit_settle),
            timers: TimerRegistry::new(),
            entities: IndexMap::new(),
            removed: HashMap::new(),
            inflight: FuturesUnordered::new(),
            fetch_seq: 0,
            applied_seq: 0,
            notifications: Vec::new(),
            notification_seq: 0,
            backlog: VecDeque::new(),
            emitter: None,
            origin: Instant::now(),
        }
    }

    /// Streams every event to `emitter` as it happens.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Returns the lifecycle configuration.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Returns the tokio instant the controller was created at.
    #[must_use]
    pub const fn origin(&self) -> Instant {
        self.origin
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Runs one atomic reconciliation pass against `entities`.
    ///
    /// Any fetch still in flight becomes stale and is discarded when it
    /// resolves.
    pub fn reconcile(&mut self, entities: &[Entity]) -> RosterDiff {
        let seq = self.next_fetch_seq();
        self.apply_roster(entities.to_vec(), seq)
    }

    /// Fetches the current roster from the store and reconciles it.
    ///
    /// # Errors
    ///
    /// Returns the store error if the fetch fails; controller state is
    /// left untouched.
    pub async fn refresh(&mut self) -> Result<RosterDiff, StoreError> {
        let seq = self.next_fetch_seq();
        let result = self.store.current_entities().await;
        metrics::record_refresh(result.is_ok());
        match result {
            Ok(entities) => Ok(self.apply_roster(entities, seq)),
            Err(e) => {
                warn!(error = %e, "roster refresh failed");
                Err(e)
            }
        }
    }

    /// Queues a background fetch, resolved by [`next_event`](Self::next_event).
    pub fn request_refresh(&mut self) {
        let seq = self.next_fetch_seq();
        let store = Arc::clone(&self.store);
        debug!(seq, "background refresh queued");
        self.inflight.push(Box::pin(async move {
            let result = store.current_entities().await;
            StoreReply::Fetched { seq, result }
        }));
    }

    fn next_fetch_seq(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetch_seq
    }

    fn apply_roster(&mut self, entities: Vec<Entity>, seq: u64) -> RosterDiff {
        self.applied_seq = seq;

        let current: IndexSet<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
        let diff = self.membership.observe(current);
        self.entities = entities.into_iter().map(|e| (e.id.clone(), e)).collect();

        for id in &diff.vanished {
            self.drop_entity(id);
        }

        let entities = &self.entities;
        self.removed
            .retain(|id, settled_at| entities.contains_key(id) && seq <= *settled_at);

        self.entrance.publish_appeared(&diff.appeared);
        metrics::set_roster_size(self.entities.len());

        if diff.is_empty() {
            debug!(seq, size = self.entities.len(), "roster unchanged");
        } else {
            info!(
                seq,
                appeared = diff.appeared.len(),
                vanished = diff.vanished.len(),
                "roster reconciled"
            );
            self.record(LifecycleEvent::Reconciled {
                appeared: diff.appeared.clone(),
                vanished: diff.vanished.clone(),
            });
        }

        self.try_start_entrance();
        diff
    }

    /// Removes every trace of `id`: timers, entrance and exit state.
    fn drop_entity(&mut self, id: &EntityId) {
        let cancelled = self.timers.cancel_all(id);
        self.entrance.forget(id);
        self.exit.forget(id);
        self.removed.remove(id);

        if cancelled > 0 {
            debug!(%id, cancelled, "timers cancelled for vanished entity");
            if let Some(emitter) = &self.emitter {
                emitter.emit(Event::TimersCancelled {
                    timestamp: chrono::Utc::now(),
                    offset_ms: offset_ms(self.origin, Instant::now()),
                    id: id.clone(),
                    count: cancelled,
                });
            }
        }
    }

    // ========================================================================
    // Entrance
    // ========================================================================

    /// Sets the designated-new identifier supplied by the creation flow.
    ///
    /// Changing the designation cancels the previous entity's pending
    /// entrance timers. Returns whether an entrance cycle started.
    pub fn set_designated_new(&mut self, id: Option<EntityId>) -> bool {
        if let Some(previous) = self.entrance.designate(id, &mut self.timers) {
            info!(%previous, "designation superseded");
        }
        self.try_start_entrance()
    }

    /// Returns the designated-new identifier.
    #[must_use]
    pub const fn designated_new(&self) -> Option<&EntityId> {
        self.entrance.designated()
    }

    fn try_start_entrance(&mut self) -> bool {
        let Some(id) = self.entrance.designated().cloned() else {
            return false;
        };

        if !self.is_present(&id) || self.exit.is_exiting(&id) || !self.entrance.can_start(&id) {
            debug!(%id, "entrance trigger ignored");
            return false;
        }

        self.entrance.start(&id, Instant::now(), &mut self.timers);
        metrics::record_entrance_started();
        info!(%id, "entrance started");
        true
    }

    // ========================================================================
    // Exit
    // ========================================================================

    /// Opens a delete confirmation prompt for `id`.
    ///
    /// Returns `false` if `id` is not in the roster, already has a prompt
    /// open, or is exiting.
    pub fn request_delete(&mut self, id: &EntityId) -> bool {
        if !self.is_present(id) || !self.exit.request(id) {
            debug!(%id, "delete request ignored");
            return false;
        }
        self.record(LifecycleEvent::DeleteRequested {
            id: id.clone(),
            at: Instant::now(),
        });
        true
    }

    /// Dismisses the confirmation prompt for `id` with no side effects.
    pub fn cancel_delete(&mut self, id: &EntityId) -> bool {
        if !self.exit.cancel(id) {
            return false;
        }
        self.record(LifecycleEvent::DeleteCancelled {
            id: id.clone(),
            at: Instant::now(),
        });
        true
    }

    /// Confirms the delete for `id`: render-locks it and starts the exit
    /// animation. The delete call is issued when the animation settles.
    pub fn confirm_delete(&mut self, id: &EntityId) -> bool {
        let now = Instant::now();
        if !self.is_present(id) || !self.exit.confirm(id, now, &mut self.timers) {
            debug!(%id, "delete confirmation ignored");
            return false;
        }

        let cancelled = self.timers.cancel_phases(id, &TimerPhase::ENTRANCE);
        self.entrance.abort(id);
        info!(%id, cancelled, "exit started");
        self.record(LifecycleEvent::ExitStarted {
            id: id.clone(),
            at: now,
        });
        true
    }

    fn issue_delete(&mut self, id: EntityId) {
        let store = Arc::clone(&self.store);
        self.inflight.push(Box::pin(async move {
            let result = store.delete(&id).await;
            StoreReply::Deleted { id, result }
        }));
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Waits for the next lifecycle event and applies it.
    ///
    /// Events produced synchronously by user actions and reconciliation
    /// are returned first, in order. Returns `None` once nothing is
    /// queued, scheduled, or in flight.
    ///
    /// Cancel-safe: every transition is applied synchronously after the
    /// wait completes, so dropping the future loses nothing.
    pub async fn next_event(&mut self) -> Option<LifecycleEvent> {
        loop {
            if let Some(event) = self.backlog.pop_front() {
                return Some(event);
            }

            let wake = tokio::select! {
                biased;
                Some(fired) = self.timers.next_expired() => Wake::Timer(fired),
                Some(reply) = self.inflight.next() => Wake::Store(reply),
                else => return None,
            };

            match wake {
                Wake::Timer(fired) => self.on_timer(fired),
                Wake::Store(reply) => self.on_store_reply(reply),
            }
        }
    }

    /// Runs the event loop for `duration` of tokio time.
    ///
    /// Events due exactly at the deadline are included.
    pub async fn run_for(&mut self, duration: Duration) -> Vec<LifecycleEvent> {
        let deadline = Instant::now() + duration;
        let mut events = Vec::new();
        loop {
            tokio::select! {
                biased;
                event = self.next_event() => match event {
                    Some(event) => events.push(event),
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                },
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
        events
    }

    /// Runs the event loop until nothing is scheduled or in flight.
    pub async fn run_until_idle(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Returns `true` if no event is queued, scheduled, or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.backlog.is_empty() && self.timers.is_empty() && self.inflight.is_empty()
    }

    fn on_timer(&mut self, fired: FiredTimer) {
        let FiredTimer { id, phase, .. } = fired;
        let now = Instant::now();

        if phase == TimerPhase::ExitSettle {
            if self.exit.on_settle(&id, now) {
                info!(%id, "exit settled; issuing delete");
                self.issue_delete(id.clone());
                self.record(LifecycleEvent::DeleteIssued { id, at: now });
            }
            return;
        }

        let event = match self.entrance.on_timer(&id, phase) {
            Some(EntranceStep::Started) => LifecycleEvent::EntranceStarted { id, at: now },
            Some(EntranceStep::Settled) => LifecycleEvent::EntranceSettled { id, at: now },
            Some(EntranceStep::Expired) => LifecycleEvent::EntranceExpired { id, at: now },
            None => return,
        };
        debug!(kind = event.kind(), "entrance advanced");
        self.record(event);
    }

    fn on_store_reply(&mut self, reply: StoreReply) {
        match reply {
            StoreReply::Deleted { id, result } => self.on_delete_settled(id, result),
            StoreReply::Fetched { seq, result } => {
                metrics::record_refresh(result.is_ok());
                if seq <= self.applied_seq {
                    debug!(seq, applied = self.applied_seq, "discarding stale roster fetch");
                    return;
                }
                match result {
                    Ok(entities) => {
                        self.apply_roster(entities, seq);
                    }
                    Err(e) => {
                        warn!(error = %e, "background refresh failed");
                        self.record(LifecycleEvent::RefreshFailed {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn on_delete_settled(&mut self, id: EntityId, result: Result<(), StoreError>) {
        let now = Instant::now();
        let tracked = self.exit.settle_delete(&id);

        match result {
            Ok(()) => {
                metrics::record_delete(DeleteOutcome::Succeeded);
                info!(%id, "delete succeeded");
                if tracked {
                    self.removed.insert(id.clone(), self.fetch_seq);
                }
                self.record(LifecycleEvent::DeleteSucceeded { id, at: now });
                if self.config.refresh_after_delete {
                    self.request_refresh();
                }
            }
            Err(e) => {
                metrics::record_delete(DeleteOutcome::Failed);
                let message = e.to_string();
                warn!(%id, error = %message, "delete failed; entity restored");
                self.raise_notification(id.clone(), message.clone());
                self.record(LifecycleEvent::DeleteFailed {
                    id,
                    at: now,
                    message,
                });
            }
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn raise_notification(&mut self, entity: EntityId, message: String) {
        self.notification_seq += 1;
        self.notifications.push(Notification {
            seq: self.notification_seq,
            entity,
            message,
        });
    }

    /// Returns the open delete-failure notifications, oldest first.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Dismisses the notification with sequence number `seq`.
    pub fn dismiss_notification(&mut self, seq: u64) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.seq != seq);
        self.notifications.len() != before
    }

    /// Dismisses every open notification. Returns how many were open.
    pub fn dismiss_all_notifications(&mut self) -> usize {
        let count = self.notifications.len();
        self.notifications.clear();
        count
    }

    // ========================================================================
    // Views
    // ========================================================================

    fn is_present(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id) && !self.removed.contains_key(id)
    }

    /// Returns the visual state of `id`, or `None` if it is not rendered.
    #[must_use]
    pub fn visual_state(&self, id: &EntityId) -> Option<VisualState> {
        if !self.is_present(id) {
            return None;
        }
        if let Some(since) = self.exit.exiting_since(id) {
            return Some(VisualState::Exiting { since });
        }
        if let Some(since) = self.entrance.entering_since(id) {
            return Some(VisualState::Entering { since });
        }
        Some(VisualState::Steady)
    }

    /// Returns the render view of every present entity, in store order.
    #[must_use]
    pub fn render(&self) -> Vec<RenderedEntity> {
        self.entities
            .values()
            .filter_map(|entity| {
                let state = self.visual_state(&entity.id)?;
                Some(RenderedEntity {
                    id: entity.id.clone(),
                    state,
                    entrance_completed: self.entrance.is_completed(&entity.id),
                    interactive: !matches!(state, VisualState::Exiting { .. }),
                    data: entity.data.clone(),
                })
            })
            .collect()
    }

    /// IDs in the latest snapshot, in store order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }

    /// Members of the Entering set.
    #[must_use]
    pub fn entering(&self) -> Vec<EntityId> {
        self.entrance.entering()
    }

    /// Members of the Completed-entrance set.
    #[must_use]
    pub fn completed_entrances(&self) -> Vec<EntityId> {
        self.entrance.completed()
    }

    /// Members of the Exiting set.
    #[must_use]
    pub fn exiting(&self) -> Vec<EntityId> {
        self.exit.exiting()
    }

    /// Returns whether `id` is in the Entering set.
    #[must_use]
    pub fn is_entering(&self, id: &EntityId) -> bool {
        self.entrance.is_entering(id)
    }

    /// Returns whether `id` is in the Exiting set.
    #[must_use]
    pub fn is_exiting(&self, id: &EntityId) -> bool {
        self.exit.is_exiting(id)
    }

    /// Returns whether a delete confirmation prompt is open for `id`.
    #[must_use]
    pub fn is_confirming(&self, id: &EntityId) -> bool {
        self.exit.is_confirming(id)
    }

    /// Returns the timer registry, for inspection.
    #[must_use]
    pub const fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Number of store calls in flight.
    #[must_use]
    pub fn pending_store_calls(&self) -> usize {
        self.inflight.len()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Tears the controller down: cancels every timer, drops in-flight
    /// store calls, and clears all controller-owned sets.
    ///
    /// The membership snapshot and designation are kept.
    pub fn shutdown(&mut self) {
        let timers = self.timers.len();
        let calls = self.inflight.len();
        self.timers.clear();
        self.inflight = FuturesUnordered::new();
        self.entrance.clear();
        self.exit.clear();
        self.removed.clear();
        self.backlog.clear();
        info!(timers, calls, "controller shut down");
    }

    fn record(&mut self, event: LifecycleEvent) {
        if let Some(emitter) = &self.emitter {
            emitter.emit_all(Event::from_lifecycle(&event, self.origin, Instant::now()));
        }
        self.backlog.push_back(event);
    }
}

impl std::fmt::Debug for RosterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterController")
            .field("entities", &self.entities.len())
            .field("timers", &self.timers)
            .field("inflight", &self.inflight.len())
            .field("notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}
