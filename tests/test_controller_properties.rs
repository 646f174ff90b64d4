//! Randomized operation sequences against the controller, checking the
//! lifecycle invariants after every step.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{id, ms};
use proptest::prelude::*;
use roster_animator::config::LifecycleConfig;
use roster_animator::lifecycle::{EntityId, LifecycleEvent, RosterController, VisualState};
use roster_animator::store::{Entity, InMemoryStore};

const POOL: [&str; 5] = ["A", "B", "C", "D", "E"];

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    RemoveElsewhere(usize),
    Designate(usize),
    Refresh,
    RequestDelete(usize),
    ConfirmDelete(usize),
    CancelDelete(usize),
    FailNextDelete,
    Wait(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let slot = 0..POOL.len();
    prop_oneof![
        slot.clone().prop_map(Op::Create),
        slot.clone().prop_map(Op::RemoveElsewhere),
        slot.clone().prop_map(Op::Designate),
        Just(Op::Refresh),
        slot.clone().prop_map(Op::RequestDelete),
        slot.clone().prop_map(Op::ConfirmDelete),
        slot.prop_map(Op::CancelDelete),
        Just(Op::FailNextDelete),
        (1u64..800).prop_map(Op::Wait),
    ]
}

fn check_invariants(ctl: &RosterController) {
    let present = ctl.entity_ids();

    for rendered in ctl.render() {
        let entering = ctl.is_entering(&rendered.id);
        let exiting = ctl.is_exiting(&rendered.id);
        assert!(!(entering && exiting), "{} entering and exiting", rendered.id);
        match rendered.state {
            VisualState::Exiting { .. } => assert!(!rendered.interactive),
            VisualState::Entering { .. } => assert!(entering),
            VisualState::Steady => {}
        }
    }

    for entity in ctl.entering() {
        assert!(present.contains(&entity), "entering {entity} not present");
    }
    for entity in ctl.exiting() {
        assert!(present.contains(&entity), "exiting {entity} not present");
    }
    for entity in ctl.completed_entrances() {
        assert!(present.contains(&entity), "completed {entity} not present");
    }
}

async fn play(ops: Vec<Op>) {
    let store = Arc::new(InMemoryStore::with_entities([Entity::new("A"), Entity::new("B")]));
    let mut ctl = RosterController::new(store.clone(), LifecycleConfig::default());
    ctl.refresh().await.unwrap();

    let mut confirmations: HashMap<EntityId, usize> = HashMap::new();
    let mut events: Vec<LifecycleEvent> = Vec::new();

    for op in ops {
        match op {
            Op::Create(i) => {
                if store.create(Some(id(POOL[i])), None).is_ok() {
                    ctl.set_designated_new(Some(id(POOL[i])));
                    ctl.refresh().await.unwrap();
                }
            }
            Op::RemoveElsewhere(i) => {
                store.remove(&id(POOL[i]));
            }
            Op::Designate(i) => {
                ctl.set_designated_new(Some(id(POOL[i])));
            }
            Op::Refresh => {
                ctl.refresh().await.unwrap();
            }
            Op::RequestDelete(i) => {
                ctl.request_delete(&id(POOL[i]));
            }
            Op::ConfirmDelete(i) => {
                if ctl.confirm_delete(&id(POOL[i])) {
                    *confirmations.entry(id(POOL[i])).or_default() += 1;
                }
            }
            Op::CancelDelete(i) => {
                ctl.cancel_delete(&id(POOL[i]));
            }
            Op::FailNextDelete => store.fail_next_delete("rejected"),
            Op::Wait(millis) => events.extend(ctl.run_for(ms(millis)).await),
        }
        check_invariants(&ctl);
    }
    events.extend(ctl.run_until_idle().await);
    check_invariants(&ctl);

    // At most one delete call per confirmation.
    for (entity, confirmed) in &confirmations {
        assert!(store.delete_count(entity) <= *confirmed);
    }

    // Settle strictly precedes expiry within every completed cycle.
    let mut settled_at = HashMap::new();
    for event in &events {
        match event {
            LifecycleEvent::EntranceSettled { id, at } => {
                settled_at.insert(id.clone(), *at);
            }
            LifecycleEvent::EntranceExpired { id, at } => {
                if let Some(settled) = settled_at.remove(id) {
                    assert!(settled < *at);
                }
            }
            _ => {}
        }
    }

    // Failed deletes leave nothing exiting.
    assert!(ctl.exiting().is_empty());
    assert!(ctl.is_idle());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_for_any_operation_sequence(ops in proptest::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(play(ops));
    }
}
