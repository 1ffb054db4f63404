//! Collection handlers for maps and sets.
//!
//! Keys and values are stored in raw form, so a wrapper and its target name
//! the same entry. Size and key enumeration track `KeyIterate`; value and
//! entry enumeration track `Iterate`.

use super::observed::Observed;
use super::{to_raw, wrap_nested};
use crate::graph::{DepKey, TrackOp, TriggerEvent, TriggerOp};
use crate::reactive::runtime::{track, trigger};
use crate::value::{has_changed, RawData, Target, TargetKind, Value};

fn wrap(observed: &Observed, value: Value) -> Value {
    if observed.is_shallow() {
        value
    } else {
        wrap_nested(value, observed.is_readonly())
    }
}

fn reject_write(observed: &Observed, op: &str) -> bool {
    if observed.is_readonly() {
        dev_warn!(
            target_id = observed.target().id().raw(),
            "{op} operation failed: target is readonly"
        );
        true
    } else {
        false
    }
}

fn require(observed: &Observed, kind: TargetKind, op: &str) -> bool {
    if observed.kind() == kind {
        true
    } else {
        dev_warn!(kind = observed.kind().name(), "{op}() is not available on this target");
        false
    }
}

fn emit(
    target: &Target,
    op: TriggerOp,
    key: Option<Value>,
    new_value: Option<Value>,
    old_value: Option<Value>,
) {
    let mut event =
        TriggerEvent::new(target.id(), Some(target.kind()), op).with_values(new_value, old_value);
    if let Some(key) = key {
        event = event.with_key(DepKey::Key(key));
    }
    trigger(event);
}

pub(super) fn get(observed: &Observed, key: Value) -> Value {
    if !require(observed, TargetKind::Map, "get") {
        return Value::Null;
    }
    let target = observed.target();
    let key = to_raw(&key);
    track(target.id(), TrackOp::Get, DepKey::Key(key.clone()));

    let value = match &*target.read() {
        RawData::Map(entries) => entries.get(&key).cloned(),
        _ => None,
    };
    value.map_or(Value::Null, |value| wrap(observed, value))
}

pub(super) fn has(observed: &Observed, key: Value) -> bool {
    let target = observed.target();
    let key = to_raw(&key);
    track(target.id(), TrackOp::Has, DepKey::Key(key.clone()));
    target.contains(key)
}

pub(super) fn len(observed: &Observed) -> usize {
    let target = observed.target();
    track(target.id(), TrackOp::Iterate, DepKey::KeyIterate);
    target.len()
}

pub(super) fn keys(observed: &Observed) -> Vec<Value> {
    let target = observed.target();
    track(target.id(), TrackOp::Iterate, DepKey::KeyIterate);
    target
        .keys()
        .into_iter()
        .map(|key| wrap(observed, key))
        .collect()
}

pub(super) fn values(observed: &Observed) -> Vec<Value> {
    entries(observed).into_iter().map(|(_, value)| value).collect()
}

pub(super) fn entries(observed: &Observed) -> Vec<(Value, Value)> {
    let target = observed.target();
    track(target.id(), TrackOp::Iterate, DepKey::Iterate);

    let raw: Vec<(Value, Value)> = match &*target.read() {
        RawData::Map(entries) => entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        RawData::Set(members) => members
            .iter()
            .map(|member| (member.clone(), member.clone()))
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|(key, value)| (wrap(observed, key), wrap(observed, value)))
        .collect()
}

pub(super) fn set(observed: &Observed, key: Value, value: Value) -> bool {
    if !require(observed, TargetKind::Map, "set") || reject_write(observed, "set") {
        return false;
    }
    let target = observed.target();
    let (key, value) = (to_raw(&key), to_raw(&value));

    let old_value = match &mut *target.write() {
        RawData::Map(entries) => entries.insert(key.clone(), value.clone()),
        _ => return false,
    };

    match old_value {
        None => emit(target, TriggerOp::Add, Some(key), Some(value), None),
        Some(old) if has_changed(&value, &old) => {
            emit(target, TriggerOp::Set, Some(key), Some(value), Some(old))
        }
        Some(_) => {}
    }
    true
}

pub(super) fn add(observed: &Observed, value: Value) -> bool {
    if !require(observed, TargetKind::Set, "add") || reject_write(observed, "add") {
        return false;
    }
    let target = observed.target();
    let value = to_raw(&value);

    let inserted = match &mut *target.write() {
        RawData::Set(members) => members.insert(value.clone()),
        _ => false,
    };
    if inserted {
        emit(target, TriggerOp::Add, Some(value.clone()), Some(value), None);
    }
    inserted
}

pub(super) fn delete(observed: &Observed, key: Value) -> bool {
    if reject_write(observed, "delete") {
        return false;
    }
    let target = observed.target();
    let key = to_raw(&key);

    let removed = match &mut *target.write() {
        RawData::Map(entries) => entries.shift_remove(&key),
        RawData::Set(members) => members.shift_take(&key),
        _ => None,
    };
    match removed {
        Some(old) => {
            emit(target, TriggerOp::Delete, Some(key), None, Some(old));
            true
        }
        None => false,
    }
}

pub(super) fn clear(observed: &Observed) {
    if !observed.kind().is_collection() {
        dev_warn!(kind = observed.kind().name(), "clear() is not available on this target");
        return;
    }
    if reject_write(observed, "clear") {
        return;
    }
    let target = observed.target();

    let had_entries = {
        let mut data = target.write();
        let had_entries = !data.is_empty();
        let removed = match &mut *data {
            RawData::Map(entries) => RawData::Map(std::mem::take(entries)),
            RawData::Set(members) => RawData::Set(std::mem::take(members)),
            _ => return,
        };
        drop(data);
        drop(removed);
        had_entries
    };
    if had_entries {
        emit(target, TriggerOp::Clear, None, None, None);
    }
}

#[cfg(test)]
mod tests {
    use crate::observe::{is_reactive, reactive, readonly, shallow_reactive};
    use crate::reactive::ReactiveEffect;
    use crate::value::{Target, Value};

    #[test]
    fn map_get_tracks_the_key() {
        let map = reactive(Target::map_from([("a", 1)]));
        let reader = map.clone();
        let effect = ReactiveEffect::new(move || reader.get("a"));

        map.set("a", 2);
        assert_eq!(effect.run_count(), 2);

        // Same value again, and a different key
        map.set("a", 2);
        map.set("b", 3);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn size_ignores_value_changes() {
        let map = reactive(Target::map_from([("a", 1)]));
        let reader = map.clone();
        let size = ReactiveEffect::new(move || reader.len());
        let values_reader = map.observed().cloned().expect("wrapper");
        let values = ReactiveEffect::new(move || values_reader.values().len());

        map.set("a", 5);
        assert_eq!(size.run_count(), 1);
        assert_eq!(values.run_count(), 2);

        map.set("b", 1);
        assert_eq!(size.run_count(), 2);
        assert_eq!(values.run_count(), 3);

        map.delete("a");
        assert_eq!(size.run_count(), 3);
    }

    #[test]
    fn set_add_and_delete() {
        let set = reactive(Target::new_set());
        let observed = set.observed().cloned().expect("wrapper");
        let reader = set.clone();
        let effect = ReactiveEffect::new(move || reader.has("x"));

        assert!(observed.add("x"));
        assert_eq!(effect.run_count(), 2);

        // Adding an existing member is not a change
        assert!(!observed.add("x"));
        assert_eq!(effect.run_count(), 2);

        assert!(set.delete("x"));
        assert_eq!(effect.run_count(), 3);
        assert!(!set.delete("x"));
    }

    #[test]
    fn clear_triggers_every_reader_once() {
        let map = reactive(Target::map_from([("a", 1), ("b", 2)]));
        let observed = map.observed().cloned().expect("wrapper");
        let reader = map.clone();
        let effect = ReactiveEffect::new(move || {
            reader.get("a");
            reader.get("b");
            reader.len()
        });

        observed.clear();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(map.len(), 0);

        // Clearing an empty map does nothing
        observed.clear();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn keys_are_stored_raw() {
        let key = Target::object();
        let map = reactive(Target::map());
        map.set(reactive(key.clone()), 1);

        assert!(map.has(key.clone()));
        assert_eq!(map.get(key), Value::from(1));
    }

    #[test]
    fn deep_results_are_wrapped() {
        let nested = Target::object();
        let map = reactive(Target::map_from([("n", Value::from(nested.clone()))]));
        assert!(is_reactive(&map.get("n")));

        let shallow = shallow_reactive(Target::map_from([("n", Value::from(nested.clone()))]));
        assert_eq!(shallow.get("n"), Value::from(nested));
    }

    #[test]
    fn readonly_collections_reject_mutation() {
        let set = readonly(Target::set_from(["a"]));
        let observed = set.observed().cloned().expect("wrapper");
        assert!(!observed.add("b"));
        assert!(!set.delete("a"));
        observed.clear();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn for_each_tracks_iteration() {
        let map = reactive(Target::map_from([("a", 1)]));
        let reader = map.observed().cloned().expect("wrapper");
        let effect = ReactiveEffect::new(move || {
            let mut total = 0.0;
            reader.for_each(|value, _key| total += value.as_f64().unwrap_or_default());
            total
        });

        map.set("a", 2);
        assert_eq!(effect.run_count(), 2);
    }
}
