//! Observed Wrappers
//!
//! This module turns raw targets into observed values: wrappers that track
//! every read and trigger on every effective write.
//!
//! # Overview
//!
//! - [`reactive`] / [`shallow_reactive`] produce mutable wrappers.
//! - [`readonly`] / [`shallow_readonly`] produce wrappers that reject writes
//!   with a warning.
//! - Deep wrappers wrap nested targets lazily, as they are read, with the
//!   same readonly-ness. Shallow wrappers return nested values as stored.
//!
//! There is at most one live reactive wrapper and one live readonly wrapper
//! per target, so wrapping the same raw value twice yields the same handle.
//!
//! # Dispatch
//!
//! Objects and arrays go through keyed-field handlers (`base`), maps and sets
//! through collection handlers (`collection`). The choice is made by the
//! target's kind, fixed when the target was created.

mod base;
mod collection;
mod observed;
mod registry;

pub use observed::{ObserveFlags, Observed};
pub(crate) use registry::Observers;

use crate::value::Value;

/// Deep mutable wrapper. Non-object values are returned unchanged.
pub fn reactive(value: impl Into<Value>) -> Value {
    registry::create_observed(value.into(), ObserveFlags::REACTIVE)
}

/// Mutable wrapper that only tracks the top level.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    registry::create_observed(value.into(), ObserveFlags::SHALLOW_REACTIVE)
}

/// Deep read-only wrapper.
pub fn readonly(value: impl Into<Value>) -> Value {
    registry::create_observed(value.into(), ObserveFlags::READONLY)
}

/// Read-only at the top level; nested values are returned as stored.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    registry::create_observed(value.into(), ObserveFlags::SHALLOW_READONLY)
}

/// Whether `value` is a mutable wrapper.
///
/// A readonly wrapper is never reactive, even when it was made from a
/// reactive one: `readonly(reactive(x))` wraps the raw target of `x`
/// directly and shares its slot with `readonly(x)`. Writes made through the
/// mutable wrapper still reach readers of the readonly one.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Observed(observed) if !observed.is_readonly())
}

/// Whether `value` is a read-only wrapper.
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Observed(observed) if observed.is_readonly())
}

/// Whether `value` is any kind of wrapper.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Observed(_))
}

/// The raw target behind a wrapper; other values are returned as is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Observed(observed) => Value::Target(observed.target().clone()),
        other => other.clone(),
    }
}

/// Mark a target so it is never wrapped. Returns the value.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Target(target) = &value {
        target.mark_skip();
    }
    value
}

/// Wrap a nested value read through a deep wrapper.
pub(crate) fn wrap_nested(value: Value, readonly: bool) -> Value {
    if !value.is_object_like() {
        return value;
    }
    let flags = if readonly {
        ObserveFlags::READONLY
    } else {
        ObserveFlags::REACTIVE
    };
    registry::create_observed(value, flags)
}
