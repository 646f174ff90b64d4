//! Shared lifecycle types.
//!
//! Identifiers, timer phases, per-entity visual states, and the events
//! the controller reports as it advances.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Stable unique identifier of a roster entity.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Creates a new `EntityId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Phase a scheduled timer belongs to.
///
/// The timer registry keeps at most one live timer per `(EntityId, TimerPhase)`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Short pre-paint delay before the entity joins the Entering set.
    EntranceStart,
    /// Entrance animation is visually complete.
    EntranceSettle,
    /// Entering bookkeeping may be cleared.
    EntranceExpire,
    /// Exit animation is complete; the delete may be issued.
    ExitSettle,
}

impl TimerPhase {
    /// Phases owned by the entrance animator.
    pub const ENTRANCE: [Self; 3] = [
        Self::EntranceStart,
        Self::EntranceSettle,
        Self::EntranceExpire,
    ];

    /// Every phase, in firing order for a full lifecycle.
    pub const ALL: [Self; 4] = [
        Self::EntranceStart,
        Self::EntranceSettle,
        Self::EntranceExpire,
        Self::ExitSettle,
    ];

    /// Returns the snake-case name used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntranceStart => "entrance_start",
            Self::EntranceSettle => "entrance_settle",
            Self::EntranceExpire => "entrance_expire",
            Self::ExitSettle => "exit_settle",
        }
    }
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single visual state an entity renders in at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    /// Playing its entrance animation.
    Entering {
        /// When the entrance was triggered.
        since: Instant,
    },
    /// At rest and interactive.
    Steady,
    /// Playing its exit animation, or waiting on the delete round-trip.
    Exiting {
        /// When the user confirmed the delete.
        since: Instant,
    },
}

impl VisualState {
    /// Returns a short label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Entering { .. } => "entering",
            Self::Steady => "steady",
            Self::Exiting { .. } => "exiting",
        }
    }
}

/// Render-facing view of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntity {
    /// Entity identifier.
    pub id: EntityId,
    /// Exactly one visual state.
    pub state: VisualState,
    /// Whether the post-entrance visual class applies.
    pub entrance_completed: bool,
    /// `false` while the entity is render-locked (exiting).
    pub interactive: bool,
    /// Server-provided entity data.
    pub data: serde_json::Value,
}

/// One-shot, dismissible user notification raised by a failed delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Monotonic sequence number, used to dismiss.
    pub seq: u64,
    /// Entity the failed delete targeted.
    pub entity: EntityId,
    /// Store error message, verbatim.
    pub message: String,
}

/// Something the controller did while advancing its event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A reconciliation pass completed.
    Reconciled {
        /// Newly appeared identifiers.
        appeared: Vec<EntityId>,
        /// Identifiers no longer returned by the store.
        vanished: Vec<EntityId>,
    },
    /// A background refresh failed; controller sets were left untouched.
    RefreshFailed {
        /// Store error message.
        message: String,
    },
    /// The entity joined the Entering set.
    EntranceStarted {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The entity joined the Completed-entrance set.
    EntranceSettled {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The entity left the Entering set.
    EntranceExpired {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The user asked to delete the entity; a confirmation prompt is open.
    DeleteRequested {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The user dismissed the confirmation prompt.
    DeleteCancelled {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The user confirmed; the entity is render-locked and animating out.
    ExitStarted {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The exit animation finished and the delete call was issued.
    DeleteIssued {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The store accepted the delete.
    DeleteSucceeded {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
    },
    /// The store rejected the delete; the entity is steady again.
    DeleteFailed {
        /// Entity identifier.
        id: EntityId,
        /// When it happened.
        at: Instant,
        /// Store error message, verbatim.
        message: String,
    },
}

impl LifecycleEvent {
    /// Returns the event kind as a snake-case string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reconciled { .. } => "reconciled",
            Self::RefreshFailed { .. } => "refresh_failed",
            Self::EntranceStarted { .. } => "entrance_started",
            Self::EntranceSettled { .. } => "entrance_settled",
            Self::EntranceExpired { .. } => "entrance_expired",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::DeleteCancelled { .. } => "delete_cancelled",
            Self::ExitStarted { .. } => "exit_started",
            Self::DeleteIssued { .. } => "delete_issued",
            Self::DeleteSucceeded { .. } => "delete_succeeded",
            Self::DeleteFailed { .. } => "delete_failed",
        }
    }

    /// Returns when the event happened, for events tied to an entity.
    #[must_use]
    pub const fn at(&self) -> Option<Instant> {
        match self {
            Self::Reconciled { .. } | Self::RefreshFailed { .. } => None,
            Self::EntranceStarted { at, .. }
            | Self::EntranceSettled { at, .. }
            | Self::EntranceExpired { at, .. }
            | Self::DeleteRequested { at, .. }
            | Self::DeleteCancelled { at, .. }
            | Self::ExitStarted { at, .. }
            | Self::DeleteIssued { at, .. }
            | Self::DeleteSucceeded { at, .. }
            | Self::DeleteFailed { at, .. } => Some(*at),
        }
    }

    /// Returns the entity this event concerns, if any.
    #[must_use]
    pub const fn entity(&self) -> Option<&EntityId> {
        match self {
            Self::Reconciled { .. } | Self::RefreshFailed { .. } => None,
            Self::EntranceStarted { id, .. }
            | Self::EntranceSettled { id, .. }
            | Self::EntranceExpired { id, .. }
            | Self::DeleteRequested { id, .. }
            | Self::DeleteCancelled { id, .. }
            | Self::ExitStarted { id, .. }
            | Self::DeleteIssued { id, .. }
            | Self::DeleteSucceeded { id, .. }
            | Self::DeleteFailed { id, .. } => Some(id),
        }
    }
}
