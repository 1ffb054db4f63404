//! Keyed-field handlers for objects and arrays.
//!
//! Reads track the resolved key (`Length` for an array's `"length"`), writes
//! go to the raw target and trigger only when they change something. Deep
//! wrappers store raw values, unwrap refs held by objects, and wrap nested
//! targets on the way out.

use super::observed::Observed;
use super::{to_raw, wrap_nested};
use crate::graph::{DepKey, TrackOp, TriggerEvent, TriggerOp};
use crate::reactive::runtime::{track, trigger};
use crate::value::{
    has_changed, resize_array, FieldKey, RawData, TargetKind, Value, MAX_ARRAY_LENGTH,
};

fn dep_key(field: &FieldKey) -> DepKey {
    match field {
        FieldKey::Length => DepKey::Length,
        other => DepKey::Key(other.to_value()),
    }
}

fn resolve(observed: &Observed, key: &Value) -> Option<FieldKey> {
    let field = FieldKey::resolve(observed.kind(), key);
    if field.is_none() {
        dev_warn!(key = %key, kind = observed.kind().name(), "invalid key");
    }
    field
}

fn reject_write(observed: &Observed, op: &str, key: &Value) -> bool {
    if observed.is_readonly() {
        dev_warn!(
            target_id = observed.target().id().raw(),
            key = %key,
            "{op} operation failed: target is readonly"
        );
        true
    } else {
        false
    }
}

/// Shape reads: object keys track `Iterate`, arrays track `Length`.
fn track_shape(observed: &Observed) {
    let target = observed.target();
    match target.kind() {
        TargetKind::Array => track(target.id(), TrackOp::Iterate, DepKey::Length),
        _ => track(target.id(), TrackOp::Iterate, DepKey::Iterate),
    }
}

fn expose(observed: &Observed, value: Value) -> Value {
    if observed.is_shallow() {
        return value;
    }
    match value {
        // Arrays hand out the ref itself.
        Value::Ref(r) if observed.kind() == TargetKind::Object => r.get(),
        value if value.is_object_like() => wrap_nested(value, observed.is_readonly()),
        value => value,
    }
}

fn stored(observed: &Observed, value: Value) -> Value {
    if observed.is_shallow() {
        value
    } else {
        to_raw(&value)
    }
}

pub(super) fn get(observed: &Observed, key: Value) -> Value {
    let Some(field) = FieldKey::resolve(observed.kind(), &key) else {
        return Value::Null;
    };
    let target = observed.target();
    track(target.id(), TrackOp::Get, dep_key(&field));

    let value = target.read().get_field(&field).unwrap_or_default();
    expose(observed, value)
}

pub(super) fn set(observed: &Observed, key: Value, value: Value) -> bool {
    if reject_write(observed, "set", &key) {
        return false;
    }
    let Some(field) = resolve(observed, &key) else {
        return false;
    };
    if field == FieldKey::Length {
        return match value.as_index() {
            Some(len) => set_len(observed, len),
            None => {
                dev_warn!(value = %value, "invalid array length");
                false
            }
        };
    }

    let target = observed.target();
    let value = stored(observed, value);

    // A ref held by an object receives the write instead of being replaced.
    if !observed.is_shallow()
        && target.kind() == TargetKind::Object
        && !matches!(value, Value::Ref(_))
    {
        let old = target.read().get_field(&field);
        if let Some(Value::Ref(old_ref)) = old {
            old_ref.set(value);
            return true;
        }
    }

    let written = {
        let mut data = target.write();
        if data.reserve_field(&field) {
            let had_key = data.has_field(&field);
            let old_value = data.set_field(&field, value.clone());
            Some((had_key, old_value))
        } else {
            None
        }
    };
    let Some((had_key, old_value)) = written else {
        dev_warn!(key = %key, "array index could not be allocated");
        return false;
    };

    if !had_key {
        trigger(
            TriggerEvent::new(target.id(), Some(target.kind()), TriggerOp::Add)
                .with_key(dep_key(&field))
                .with_values(Some(value), None),
        );
    } else if old_value.as_ref().map_or(true, |old| has_changed(&value, old)) {
        trigger(
            TriggerEvent::new(target.id(), Some(target.kind()), TriggerOp::Set)
                .with_key(dep_key(&field))
                .with_values(Some(value), old_value),
        );
    }
    true
}

pub(super) fn delete(observed: &Observed, key: Value) -> bool {
    if reject_write(observed, "delete", &key) {
        return false;
    }
    let Some(field) = resolve(observed, &key) else {
        return false;
    };
    if field == FieldKey::Length {
        return false;
    }

    let target = observed.target();
    let removed = target.write().remove_field(&field);
    match removed {
        Some(old_value) => {
            trigger(
                TriggerEvent::new(target.id(), Some(target.kind()), TriggerOp::Delete)
                    .with_key(dep_key(&field))
                    .with_values(None, Some(old_value)),
            );
            true
        }
        None => false,
    }
}

pub(super) fn has(observed: &Observed, key: Value) -> bool {
    let Some(field) = FieldKey::resolve(observed.kind(), &key) else {
        return false;
    };
    let target = observed.target();
    track(target.id(), TrackOp::Has, dep_key(&field));
    target.read().has_field(&field)
}

pub(super) fn len(observed: &Observed) -> usize {
    track_shape(observed);
    observed.target().len()
}

pub(super) fn keys(observed: &Observed) -> Vec<Value> {
    track_shape(observed);
    observed.target().keys()
}

pub(super) fn values(observed: &Observed) -> Vec<Value> {
    keys(observed)
        .into_iter()
        .map(|key| get(observed, key))
        .collect()
}

pub(super) fn entries(observed: &Observed) -> Vec<(Value, Value)> {
    keys(observed)
        .into_iter()
        .map(|key| {
            let value = get(observed, key.clone());
            (key, value)
        })
        .collect()
}

fn array_only(observed: &Observed, op: &str) -> bool {
    if observed.kind() == TargetKind::Array {
        true
    } else {
        dev_warn!(kind = observed.kind().name(), "{op}() is only available on arrays");
        false
    }
}

pub(super) fn push(observed: &Observed, value: Value) -> usize {
    if !array_only(observed, "push") || reject_write(observed, "push", &value) {
        return observed.target().len();
    }
    let target = observed.target();
    let value = stored(observed, value);

    let index = {
        let mut data = target.write();
        match &mut *data {
            RawData::Array(items) => {
                items.push(value.clone());
                items.len() - 1
            }
            _ => return 0,
        }
    };

    trigger(
        TriggerEvent::new(target.id(), Some(TargetKind::Array), TriggerOp::Add)
            .with_key(DepKey::key(index))
            .with_values(Some(value), None),
    );
    index + 1
}

pub(super) fn pop(observed: &Observed) -> Value {
    if !array_only(observed, "pop") || reject_write(observed, "pop", &Value::from("length")) {
        return Value::Null;
    }
    let target = observed.target();

    let (popped, new_len) = {
        let mut data = target.write();
        match &mut *data {
            RawData::Array(items) => (items.pop(), items.len()),
            _ => (None, 0),
        }
    };
    let Some(popped) = popped else {
        return Value::Null;
    };

    trigger(
        TriggerEvent::new(target.id(), Some(TargetKind::Array), TriggerOp::Set)
            .with_key(DepKey::Length)
            .with_values(Some(Value::from(new_len)), Some(Value::from(new_len + 1))),
    );
    expose(observed, popped)
}

pub(super) fn set_len(observed: &Observed, len: usize) -> bool {
    if !array_only(observed, "set_len") || reject_write(observed, "set", &Value::from("length")) {
        return false;
    }
    if len > MAX_ARRAY_LENGTH {
        dev_warn!(len, "invalid array length");
        return false;
    }
    let target = observed.target();

    let (old_len, removed) = {
        let mut data = target.write();
        match &mut *data {
            RawData::Array(items) => {
                let old_len = items.len();
                let removed = if len < old_len {
                    items.split_off(len)
                } else if resize_array(items, len) {
                    Vec::new()
                } else {
                    dev_warn!(len, "array length could not be allocated");
                    return false;
                };
                (old_len, removed)
            }
            _ => return false,
        }
    };
    drop(removed);

    if old_len != len {
        trigger(
            TriggerEvent::new(target.id(), Some(TargetKind::Array), TriggerOp::Set)
                .with_key(DepKey::Length)
                .with_values(Some(Value::from(len)), Some(Value::from(old_len))),
        );
    }
    true
}

/// Position of `needle`, tracking the length and every index inspected.
/// Retries with the raw form of `needle` so wrappers find their targets.
pub(super) fn index_of(observed: &Observed, needle: &Value) -> Option<usize> {
    if !array_only(observed, "index_of") {
        return None;
    }
    let target = observed.target();
    let id = target.id();

    let items = match target.snapshot() {
        RawData::Array(items) => items,
        _ => return None,
    };
    track(id, TrackOp::Get, DepKey::Length);
    for index in 0..items.len() {
        track(id, TrackOp::Get, DepKey::key(index));
    }

    let position = |needle: &Value| items.iter().position(|item| item == needle);
    position(needle).or_else(|| position(&to_raw(needle)))
}
