//! Structured event stream.
//!
//! Discrete, typed events emitted while the controller runs. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::lifecycle::{EntityId, LifecycleEvent};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a run.
///
/// Serialized with a `"type"` tag. `offset_ms` is measured on the tokio
/// clock from the moment the controller was created, so it stays
/// meaningful when time is paused or simulated.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Scenario playback started.
    RunStarted {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Scenario name.
        scenario: String,
        /// Entities in the initial roster.
        roster_size: usize,
    },

    /// Scenario playback finished.
    RunFinished {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Steps played.
        steps: usize,
        /// Notifications still open.
        open_notifications: usize,
    },

    /// A scenario step was applied.
    StepApplied {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Zero-based step index.
        index: usize,
        /// Step kind.
        step: String,
    },

    /// An ID appeared in the roster.
    EntityAppeared {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Entity identifier.
        id: EntityId,
    },

    /// An ID disappeared from the roster.
    EntityVanished {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Entity identifier.
        id: EntityId,
    },

    /// Pending timers were cancelled for an entity.
    TimersCancelled {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Entity identifier.
        id: EntityId,
        /// Number of live timers cancelled.
        count: usize,
    },

    /// A roster fetch failed.
    RefreshFailed {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Store error message.
        message: String,
    },

    /// A per-entity lifecycle transition.
    Lifecycle {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Milliseconds since the controller was created.
        offset_ms: u64,
        /// Transition kind (e.g. `"entrance_settled"`).
        kind: String,
        /// Entity identifier.
        id: EntityId,
        /// Store error message, for failed deletes.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Event {
    /// Translates a controller event into stream events.
    ///
    /// A reconciliation pass expands into one event per appeared or
    /// vanished ID; every other event maps one to one.
    #[must_use]
    pub fn from_lifecycle(event: &LifecycleEvent, origin: Instant, now: Instant) -> Vec<Self> {
        let timestamp = Utc::now();
        let elapsed = offset_ms(origin, now);

        match event {
            LifecycleEvent::Reconciled { appeared, vanished } => appeared
                .iter()
                .map(|id| Self::EntityAppeared {
                    timestamp,
                    offset_ms: elapsed,
                    id: id.clone(),
                })
                .chain(vanished.iter().map(|id| Self::EntityVanished {
                    timestamp,
                    offset_ms: elapsed,
                    id: id.clone(),
                }))
                .collect(),
            LifecycleEvent::RefreshFailed { message } => vec![Self::RefreshFailed {
                timestamp,
                offset_ms: elapsed,
                message: message.clone(),
            }],
            LifecycleEvent::DeleteFailed { id, at, message } => vec![Self::Lifecycle {
                timestamp,
                offset_ms: offset_ms(origin, *at),
                kind: event.kind().to_owned(),
                id: id.clone(),
                message: Some(message.clone()),
            }],
            LifecycleEvent::EntranceStarted { id, at }
            | LifecycleEvent::EntranceSettled { id, at }
            | LifecycleEvent::EntranceExpired { id, at }
            | LifecycleEvent::DeleteRequested { id, at }
            | LifecycleEvent::DeleteCancelled { id, at }
            | LifecycleEvent::ExitStarted { id, at }
            | LifecycleEvent::DeleteIssued { id, at }
            | LifecycleEvent::DeleteSucceeded { id, at } => vec![Self::Lifecycle {
                timestamp,
                offset_ms: offset_ms(origin, *at),
                kind: event.kind().to_owned(),
                id: id.clone(),
                message: None,
            }],
        }
    }
}

/// Milliseconds from `origin` to `now`, saturating.
#[must_use]
pub fn offset_ms(origin: Instant, now: Instant) -> u64 {
    u64::try_from(now.saturating_duration_since(origin).as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes. Serialization
/// and I/O failures are dropped: a broken event sink must not stop the
/// controller.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Emits every event in `events`, in order.
    pub fn emit_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
