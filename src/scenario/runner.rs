//! Scenario playback.
//!
//! A [`ScenarioRunner`] seeds an [`InMemoryStore`] with the scenario's
//! initial roster, bootstraps a [`RosterController`] against it, and plays
//! each step in order. Synchronous effects are flushed after every step so
//! the report sees events in the order they happened. After the last step
//! the controller is settled, so the final render is at rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{ScenarioConfig, Step};
use crate::error::{ScenarioError, StoreError};
use crate::lifecycle::{EntityId, LifecycleEvent, Notification, RosterController};
use crate::observability::events::{Event, EventEmitter, offset_ms};
use crate::store::{Entity, InMemoryStore};

// ============================================================================
// Report
// ============================================================================

/// One controller event, as recorded in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEvent {
    /// Milliseconds since playback started.
    pub offset_ms: u64,
    /// Event kind (e.g. `"entrance_settled"`).
    pub kind: &'static str,
    /// Entity the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Extra context: roster changes or a store error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final render state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntity {
    /// Entity identifier.
    pub id: EntityId,
    /// Visual state label.
    pub state: &'static str,
    /// Whether the post-entrance visual class applies.
    pub entrance_completed: bool,
    /// Whether the entity accepts user actions.
    pub interactive: bool,
    /// Server-provided data.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

/// One delete call the store received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRecord {
    /// Targeted entity.
    pub id: EntityId,
    /// Milliseconds since playback started.
    pub offset_ms: u64,
    /// Whether the store accepted the call.
    pub ok: bool,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Steps played.
    pub steps: usize,
    /// Indices of steps the controller ignored as stale or unknown.
    pub ignored_steps: Vec<usize>,
    /// Controller events, in order.
    pub events: Vec<ReportEvent>,
    /// Final render, in store order.
    pub roster: Vec<ReportEntity>,
    /// Notifications still open.
    pub notifications: Vec<Notification>,
    /// Delete calls the store received.
    pub deletes: Vec<DeleteRecord>,
    /// Total playback time on the tokio clock.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Returns the events concerning `id`, in order.
    #[must_use]
    pub fn events_for(&self, id: &EntityId) -> Vec<&ReportEvent> {
        self.events
            .iter()
            .filter(|e| e.id.as_ref() == Some(id))
            .collect()
    }

    /// Returns the kinds of the events concerning `id`, in order.
    #[must_use]
    pub fn kinds_for(&self, id: &EntityId) -> Vec<&'static str> {
        self.events_for(id).iter().map(|e| e.kind).collect()
    }

    /// Returns the final render entry for `id`.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&ReportEntity> {
        self.roster.iter().find(|e| &e.id == id)
    }
}

/// Collects controller events with their offsets from playback start.
struct EventLog {
    origin: Instant,
    events: Vec<ReportEvent>,
}

impl EventLog {
    const fn new(origin: Instant) -> Self {
        Self {
            origin,
            events: Vec::new(),
        }
    }

    fn extend(&mut self, events: Vec<LifecycleEvent>) {
        let now = Instant::now();
        for event in events {
            let at = event.at().unwrap_or(now);
            let detail = match &event {
                LifecycleEvent::Reconciled { appeared, vanished } => Some(format!(
                    "appeared={} vanished={}",
                    join_ids(appeared),
                    join_ids(vanished)
                )),
                LifecycleEvent::RefreshFailed { message }
                | LifecycleEvent::DeleteFailed { message, .. } => Some(message.clone()),
                _ => None,
            };
            self.events.push(ReportEvent {
                offset_ms: offset_ms(self.origin, at),
                kind: event.kind(),
                id: event.entity().cloned(),
                detail,
            });
        }
    }
}

fn join_ids(ids: &[EntityId]) -> String {
    let ids: Vec<&str> = ids.iter().map(EntityId::as_str).collect();
    format!("[{}]", ids.join(","))
}

// ============================================================================
// Runner
// ============================================================================

/// Plays a [`ScenarioConfig`] against an in-memory store.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: Arc<ScenarioConfig>,
    emitter: Option<Arc<EventEmitter>>,
}

impl ScenarioRunner {
    /// Creates a runner for `config`.
    #[must_use]
    pub const fn new(config: Arc<ScenarioConfig>) -> Self {
        Self {
            config,
            emitter: None,
        }
    }

    /// Streams run and controller events to `emitter`.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Returns the scenario being played.
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Plays every step, then settles the controller.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Bootstrap` if the initial fetch fails,
    /// `ScenarioError::StepFailed` if a create or refresh step is rejected
    /// by the store, or `ScenarioError::SettleTimeout` if the controller
    /// does not go idle within `settle_timeout`.
    pub async fn run(&self) -> Result<RunReport, ScenarioError> {
        let config = &*self.config;
        let store = Arc::new(
            InMemoryStore::with_entities(config.roster.iter().map(Entity::from))
                .with_delete_latency(config.delete_latency),
        );

        let mut controller = RosterController::new(store.clone(), config.lifecycle.clone());
        if let Some(emitter) = &self.emitter {
            controller = controller.with_emitter(Arc::clone(emitter));
            emitter.emit(Event::RunStarted {
                timestamp: Utc::now(),
                scenario: config.name.clone(),
                roster_size: config.roster.len(),
            });
        }
        info!(
            scenario = %config.name,
            roster = config.roster.len(),
            steps = config.steps.len(),
            "scenario started"
        );

        let origin = controller.origin();
        let mut log = EventLog::new(origin);
        controller
            .refresh()
            .await
            .map_err(ScenarioError::Bootstrap)?;

        let mut ignored_steps = Vec::new();
        for (index, step) in config.steps.iter().enumerate() {
            if let Some(emitter) = &self.emitter {
                emitter.emit(Event::StepApplied {
                    timestamp: Utc::now(),
                    offset_ms: offset_ms(origin, Instant::now()),
                    index,
                    step: step.kind().to_owned(),
                });
            }

            let applied = self
                .apply_step(index, step, &store, &mut controller, &mut log)
                .await?;
            if !applied {
                debug!(index, step = step.kind(), "step ignored by controller");
                ignored_steps.push(index);
            }

            // Flush synchronous effects and anything due right now.
            log.extend(controller.run_for(Duration::ZERO).await);
        }

        log.extend(self.settle(&mut controller).await?);

        let notifications = controller.notifications().to_vec();
        if let Some(emitter) = &self.emitter {
            emitter.emit(Event::RunFinished {
                timestamp: Utc::now(),
                steps: config.steps.len(),
                open_notifications: notifications.len(),
            });
        }

        let report = RunReport {
            scenario: config.name.clone(),
            steps: config.steps.len(),
            ignored_steps,
            events: log.events,
            roster: controller
                .render()
                .into_iter()
                .map(|r| ReportEntity {
                    id: r.id,
                    state: r.state.label(),
                    entrance_completed: r.entrance_completed,
                    interactive: r.interactive,
                    data: r.data,
                })
                .collect(),
            notifications,
            deletes: store
                .delete_calls()
                .into_iter()
                .map(|call| DeleteRecord {
                    id: call.id,
                    offset_ms: offset_ms(origin, call.at),
                    ok: call.result.is_ok(),
                })
                .collect(),
            elapsed_ms: offset_ms(origin, Instant::now()),
        };

        controller.shutdown();
        info!(
            scenario = %report.scenario,
            events = report.events.len(),
            elapsed_ms = report.elapsed_ms,
            "scenario finished"
        );
        Ok(report)
    }

    /// Applies one step. Returns `false` if the controller ignored it.
    async fn apply_step(
        &self,
        index: usize,
        step: &Step,
        store: &InMemoryStore,
        controller: &mut RosterController,
        log: &mut EventLog,
    ) -> Result<bool, ScenarioError> {
        let failed = |source: StoreError| ScenarioError::StepFailed {
            index,
            step: step.kind().to_owned(),
            source,
        };

        let applied = match step {
            Step::Create(create) => {
                let id = store
                    .create(create.id.clone(), create.name.as_deref())
                    .map_err(failed)?;
                if create.designate {
                    controller.set_designated_new(Some(id));
                }
                if create.refresh {
                    controller.refresh().await.map_err(failed)?;
                }
                true
            }
            Step::Designate(id) => {
                controller.set_designated_new(Some(id.clone()));
                true
            }
            Step::ClearDesignation => {
                controller.set_designated_new(None);
                true
            }
            Step::Refresh => {
                controller.refresh().await.map_err(failed)?;
                true
            }
            Step::RequestDelete(id) => controller.request_delete(id),
            Step::ConfirmDelete(id) => controller.confirm_delete(id),
            Step::CancelDelete(id) => controller.cancel_delete(id),
            Step::FailNextDelete(message) => {
                store.fail_next_delete(message.clone());
                true
            }
            Step::Wait(duration) => {
                log.extend(controller.run_for(*duration).await);
                true
            }
            Step::Settle => {
                log.extend(self.settle(controller).await?);
                true
            }
            Step::DismissNotifications => {
                let dismissed = controller.dismiss_all_notifications();
                debug!(dismissed, "notifications dismissed");
                true
            }
        };
        Ok(applied)
    }

    async fn settle(
        &self,
        controller: &mut RosterController,
    ) -> Result<Vec<LifecycleEvent>, ScenarioError> {
        let limit = self.config.settle_timeout;
        tokio::time::timeout(limit, controller.run_until_idle())
            .await
            .map_err(|_| ScenarioError::SettleTimeout(limit))
    }
}
