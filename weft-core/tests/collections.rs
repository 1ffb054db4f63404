//! Collection and array behaviour through observed wrappers.

use std::sync::Arc;

use parking_lot::Mutex;

use weft_core::{
    is_reactive, readonly, reactive, shallow_readonly, to_refs, untracked, ReactiveEffect,
    Target, Value,
};

#[test]
fn set_membership_and_iteration() {
    let tags = reactive(Target::set_from(["a"]));
    let observed = tags.observed().cloned().expect("wrapper");

    let members = Arc::new(Mutex::new(Vec::new()));
    let sink = members.clone();
    let reader = observed.clone();
    let runner = ReactiveEffect::new(move || {
        *sink.lock() = reader.values();
    });

    observed.add("b");
    assert_eq!(runner.run_count(), 2);
    assert_eq!(*members.lock(), vec![Value::from("a"), Value::from("b")]);

    observed.delete("a");
    assert_eq!(runner.run_count(), 3);
    assert_eq!(*members.lock(), vec![Value::from("b")]);
}

#[test]
fn map_entries_are_wrapped_deeply() {
    let inner = Target::object_from([("n", 1)]);
    let map = reactive(Target::map_from([("inner", Value::from(inner))]));
    let observed = map.observed().cloned().expect("wrapper");

    let entries = observed.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, Value::from("inner"));
    assert!(is_reactive(&entries[0].1));

    let reader = observed.clone();
    let runner = ReactiveEffect::new(move || {
        for (_, value) in reader.entries() {
            value.get("n");
        }
    });

    // Writes through a nested wrapper reach readers of the nested key
    entries[0].1.set("n", 2);
    assert_eq!(runner.run_count(), 2);
}

#[test]
fn readonly_map_reads_but_never_writes() {
    let map = readonly(Target::map_from([("a", 1)]));
    assert_eq!(map.get("a"), Value::from(1));
    assert!(!map.set("a", 2));
    assert!(!map.delete("a"));
    assert_eq!(map.len(), 1);
}

#[test]
fn shallow_readonly_exposes_nested_values_as_stored() {
    let nested = Target::object();
    let state = shallow_readonly(Target::object_from([("nested", Value::from(nested.clone()))]));

    let value = state.get("nested");
    assert_eq!(value, Value::from(nested));
    // The nested raw target is still writable
    assert!(value.set("x", 1));
}

#[test]
fn array_iteration_tracks_length() {
    let list = reactive(Target::array_from([1, 2]));
    let observed = list.observed().cloned().expect("wrapper");

    let reader = observed.clone();
    let runner = ReactiveEffect::new(move || reader.values().len());

    observed.push(3);
    assert_eq!(runner.run_count(), 2);

    // Replacing an element that was read re-runs the effect too
    list.set(0, 10);
    assert_eq!(runner.run_count(), 3);

    // An unchanged write does nothing
    list.set(0, 10);
    assert_eq!(runner.run_count(), 3);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let state = reactive(Target::object_from([("a", 1), ("b", 2)]));
    let reader = state.clone();
    let runner = ReactiveEffect::new(move || {
        reader.get("a");
        untracked(|| reader.get("b"));
    });

    state.set("b", 3);
    assert_eq!(runner.run_count(), 1);
    state.set("a", 3);
    assert_eq!(runner.run_count(), 2);
}

#[test]
fn to_refs_track_each_field() {
    let state = reactive(Target::object_from([("x", 1), ("y", 2)]));
    let refs = to_refs(&state);
    let y = refs[&Value::from("y")].clone();

    let reader = y.clone();
    let runner = ReactiveEffect::new(move || reader.get());

    state.set("x", 10);
    assert_eq!(runner.run_count(), 1);
    state.set("y", 20);
    assert_eq!(runner.run_count(), 2);
    assert_eq!(y.get(), Value::from(20));
}

#[test]
fn json_round_trip_of_collections() {
    let map = Target::map_from([("k", 1)]);
    let set = Target::set_from([1, 2]);
    let state = reactive(Target::object_from([
        ("map", Value::from(map)),
        ("set", Value::from(set)),
    ]));

    assert_eq!(
        state.to_json(),
        serde_json::json!({ "map": [["k", 1.0]], "set": [1.0, 2.0] })
    );
}
