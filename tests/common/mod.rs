//! Shared integration-test helpers: controller fixtures over an in-memory
//! store, and a harness for running the `roster-animator` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use roster_animator::config::LifecycleConfig;
use roster_animator::lifecycle::{EntityId, LifecycleEvent, RosterController};
use roster_animator::store::{Entity, InMemoryStore};

/// Shorthand for an entity ID.
pub fn id(s: &str) -> EntityId {
    EntityId::new(s)
}

/// Shorthand for a millisecond duration.
pub const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Builds a controller over a store holding `ids` and runs the bootstrap
/// refresh.
pub async fn bootstrap(ids: &[&str]) -> (Arc<InMemoryStore>, RosterController) {
    bootstrap_with(ids, LifecycleConfig::default()).await
}

/// Like [`bootstrap`], with explicit lifecycle timing.
#[allow(clippy::missing_panics_doc)]
pub async fn bootstrap_with(
    ids: &[&str],
    config: LifecycleConfig,
) -> (Arc<InMemoryStore>, RosterController) {
    let store = Arc::new(InMemoryStore::with_entities(
        ids.iter().map(|s| Entity::new(*s)),
    ));
    let mut controller = RosterController::new(store.clone(), config);
    let diff = controller.refresh().await.expect("bootstrap refresh");
    assert!(diff.is_empty(), "bootstrap must not report changes");
    (store, controller)
}

/// Simulates the creation flow: the store accepts the create, the flow
/// designates the new ID, then refetches the roster.
#[allow(clippy::missing_panics_doc)]
pub async fn create(store: &InMemoryStore, controller: &mut RosterController, name: &str) {
    store.create(Some(id(name)), None).expect("create");
    controller.set_designated_new(Some(id(name)));
    controller.refresh().await.expect("refresh");
}

/// Kinds of the events concerning `target`, in order.
pub fn kinds_for(events: &[LifecycleEvent], target: &str) -> Vec<&'static str> {
    events
        .iter()
        .filter(|e| e.entity().is_some_and(|e| e.as_str() == target))
        .map(LifecycleEvent::kind)
        .collect()
}

/// Runs the `roster-animator` binary with `args` and waits for it.
#[allow(clippy::missing_panics_doc)]
pub fn spawn_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_roster-animator"))
        .args(args)
        .env_remove("ROSTER_ANIMATOR_LOG_LEVEL")
        .output()
        .expect("failed to spawn roster-animator")
}

/// Path to a built-in scenario file in the repository.
pub fn scenario_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(format!("{name}.yaml"))
}
