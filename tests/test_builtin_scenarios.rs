mod common;

use std::sync::Arc;

use common::id;
use roster_animator::config::{ScenarioConfig, ScenarioLoader};
use roster_animator::scenario::{RunReport, ScenarioRunner, find_scenario};

fn builtin(name: &str) -> Arc<ScenarioConfig> {
    let scenario = find_scenario(name).unwrap_or_else(|| panic!("no builtin '{name}'"));
    ScenarioLoader::with_defaults()
        .load_from_str(scenario.yaml)
        .unwrap()
        .config
}

async fn play(name: &str) -> RunReport {
    ScenarioRunner::new(builtin(name)).run().await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn new_entrance() {
    let report = play("new-entrance").await;

    let timeline: Vec<(&str, u64)> = report
        .events_for(&id("C"))
        .iter()
        .map(|e| (e.kind, e.offset_ms))
        .collect();
    assert_eq!(
        timeline,
        vec![
            ("entrance_started", 16),
            ("entrance_settled", 500),
            ("entrance_expired", 2000),
        ]
    );
    assert!(report.kinds_for(&id("A")).is_empty());
    assert!(report.kinds_for(&id("B")).is_empty());

    let ids: Vec<&str> = report.roster.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert!(report.entity(&id("C")).unwrap().entrance_completed);
    assert!(!report.entity(&id("A")).unwrap().entrance_completed);
    assert_eq!(report.entity(&id("C")).unwrap().data["name"], "Cora");
}

#[tokio::test(start_paused = true)]
async fn superseded_create() {
    let report = play("superseded-create").await;

    assert!(report.kinds_for(&id("C")).is_empty());
    assert_eq!(
        report.kinds_for(&id("D")),
        vec!["entrance_started", "entrance_settled", "entrance_expired"]
    );
    assert!(!report.entity(&id("C")).unwrap().entrance_completed);
    assert!(report.entity(&id("D")).unwrap().entrance_completed);
}

#[tokio::test(start_paused = true)]
async fn cancel_delete() {
    let report = play("cancel-delete").await;

    assert_eq!(
        report.kinds_for(&id("A")),
        vec!["delete_requested", "delete_cancelled"]
    );
    assert!(report.deletes.is_empty());
    assert_eq!(report.entity(&id("A")).unwrap().state, "steady");
    assert!(report.notifications.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_delete() {
    let report = play("failed-delete").await;

    assert_eq!(
        report.kinds_for(&id("A")),
        vec![
            "delete_requested",
            "exit_started",
            "delete_issued",
            "delete_failed"
        ]
    );
    assert_eq!(report.deletes.len(), 1);
    assert_eq!(report.deletes[0].offset_ms, 500);
    assert!(!report.deletes[0].ok);

    let a = report.entity(&id("A")).unwrap();
    assert_eq!(a.state, "steady");
    assert!(a.interactive);

    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].message, "character is in a guild");
}

#[tokio::test(start_paused = true)]
async fn delete_roundtrip() {
    let report = play("delete-roundtrip").await;

    let timeline: Vec<(&str, u64)> = report
        .events_for(&id("B"))
        .iter()
        .map(|e| (e.kind, e.offset_ms))
        .collect();
    assert_eq!(
        timeline,
        vec![
            ("delete_requested", 0),
            ("exit_started", 0),
            ("delete_issued", 400),
            ("delete_succeeded", 700),
        ]
    );

    let last = report.events.last().unwrap();
    assert_eq!(last.kind, "reconciled");
    assert_eq!(last.detail.as_deref(), Some("appeared=[] vanished=[B]"));

    let ids: Vec<&str> = report.roster.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "C"]);
    assert!(report.deletes[0].ok);
}

#[tokio::test(start_paused = true)]
async fn report_serializes_to_json() {
    let report = play("failed-delete").await;
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenario"], "failed delete");
    assert_eq!(json["notifications"][0]["entity"], "A");
    assert_eq!(json["roster"][0]["state"], "steady");
    assert!(json["events"].as_array().unwrap().len() >= 4);
}
