//! Raw-to-wrapper identity registry.
//!
//! Each target stores weak references to its live reactive and readonly
//! wrappers. Shallow and deep wrappers of the same readonly-ness share a
//! slot: whichever is created first is returned until it is dropped.

use std::sync::{Arc, Weak};

use super::observed::{ObserveFlags, Observed, ObservedInner};
use crate::value::{Target, Value};

/// Per-target wrapper slots.
#[derive(Default)]
pub(crate) struct Observers {
    reactive: Weak<ObservedInner>,
    readonly: Weak<ObservedInner>,
}

impl Observers {
    fn slot(&mut self, readonly: bool) -> &mut Weak<ObservedInner> {
        if readonly {
            &mut self.readonly
        } else {
            &mut self.reactive
        }
    }

    /// The live mutable wrapper, if any.
    pub(crate) fn reactive(&self) -> Option<Observed> {
        self.reactive.upgrade().map(Observed::from_inner)
    }

    /// The live read-only wrapper, if any.
    pub(crate) fn readonly(&self) -> Option<Observed> {
        self.readonly.upgrade().map(Observed::from_inner)
    }
}

/// Wrap `value` according to `flags`, reusing a live wrapper when there is
/// one.
pub(super) fn create_observed(value: Value, flags: ObserveFlags) -> Value {
    match value {
        Value::Observed(observed) => {
            // Readonly wrappers are never made mutable again, and a mutable
            // wrapper is already as reactive as it gets.
            if !flags.readonly || observed.is_readonly() {
                return Value::Observed(observed);
            }
            let target = observed.target().clone();
            wrap_target(target, flags)
        }
        Value::Target(target) => wrap_target(target, flags),
        other => {
            dev_warn!(value = %other, "value cannot be made reactive");
            other
        }
    }
}

fn wrap_target(target: Target, flags: ObserveFlags) -> Value {
    if target.is_skipped() || target.is_frozen() {
        return Value::Target(target);
    }

    let mut observers = target.observers();
    let slot = observers.slot(flags.readonly);
    if let Some(inner) = slot.upgrade() {
        return Value::Observed(Observed::from_inner(inner));
    }

    let observed = Observed::new(target.clone(), flags);
    *slot = Arc::downgrade(observed.inner());
    drop(observers);

    Value::Observed(observed)
}
