#![no_main]

use indexmap::IndexSet;
use libfuzzer_sys::fuzz_target;
use roster_animator::lifecycle::{EntityId, diff};

fuzz_target!(|data: &[u8]| {
    // First half is the previous snapshot, second half the current one;
    // each byte is one ID drawn from a small alphabet.
    let (prev, curr) = data.split_at(data.len() / 2);
    let to_set = |bytes: &[u8]| -> IndexSet<EntityId> {
        bytes
            .iter()
            .map(|b| EntityId::new(format!("e{}", b % 16)))
            .collect()
    };
    let prev = to_set(prev);
    let curr = to_set(curr);

    let result = diff(&prev, &curr);
    for id in &result.appeared {
        assert!(curr.contains(id) && !prev.contains(id));
    }
    for id in &result.vanished {
        assert!(prev.contains(id) && !curr.contains(id));
    }
    let changed = curr.symmetric_difference(&prev).count();
    assert_eq!(result.appeared.len() + result.vanished.len(), changed);
});
