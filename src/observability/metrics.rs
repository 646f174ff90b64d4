//! Metrics collection.
//!
//! Prometheus-compatible counters and gauges with typed recording
//! functions. Label values come from closed enums only, so cardinality is
//! bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::RosterAnimatorError;
use crate::lifecycle::TimerPhase;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Outcome label for `roster_deletes_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The store accepted the delete.
    Succeeded,
    /// The store rejected the delete.
    Failed,
}

impl DeleteOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `RosterAnimatorError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), RosterAnimatorError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| RosterAnimatorError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "roster_entrances_total",
        "Entrance cycles started for designated entities"
    );
    describe_counter!(
        "roster_deletes_total",
        "Delete calls settled, by outcome"
    );
    describe_counter!(
        "roster_timers_cancelled_total",
        "Lifecycle timers cancelled before firing, by phase"
    );
    describe_gauge!("roster_timers_live", "Currently scheduled lifecycle timers");
    describe_counter!(
        "roster_refreshes_total",
        "Roster fetches completed, by status"
    );
    describe_gauge!("roster_entities", "Entities in the latest roster snapshot");
}

/// Records the start of an entrance cycle.
pub fn record_entrance_started() {
    counter!("roster_entrances_total").increment(1);
}

/// Records a settled delete call.
pub fn record_delete(outcome: DeleteOutcome) {
    counter!("roster_deletes_total", "outcome" => outcome.as_str()).increment(1);
}

/// Records a timer cancelled before it fired.
pub fn record_timer_cancelled(phase: TimerPhase) {
    counter!("roster_timers_cancelled_total", "phase" => phase.as_str()).increment(1);
}

/// Sets the number of live timers.
#[allow(clippy::cast_precision_loss)]
pub fn set_live_timers(count: usize) {
    gauge!("roster_timers_live").set(count as f64);
}

/// Records a completed roster fetch.
pub fn record_refresh(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("roster_refreshes_total", "status" => status).increment(1);
}

/// Sets the size of the latest roster snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn set_roster_size(count: usize) {
    gauge!("roster_entities").set(count as f64);
}
