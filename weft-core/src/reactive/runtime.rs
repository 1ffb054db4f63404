//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive data and
//! effects. It owns the dependency registry and implements track/trigger.
//!
//! # How It Works
//!
//! 1. When an observed value is read while an effect is running, the wrapper
//!    calls [`track`], which subscribes the running effect to the Dep of
//!    that (target, key).
//!
//! 2. When an observed value is written, the wrapper calls [`trigger`],
//!    which:
//!    a. Collects the Dep of the written key plus the synthetic Deps the
//!       write affects (length, iteration)
//!    b. Deduplicates the subscribers so each effect runs once
//!    c. Dispatches computed effects first, then plain effects
//!    d. Hands each effect to its scheduler, or runs it right away
//!
//! # Threading
//!
//! The registry is thread-local. Dropping a target removes its entry, so the
//! registry never keeps raw data alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::{should_track, ReactiveContext};
use super::{EffectId, ReactiveEffect};
use crate::error::{handle_error, panic_message, ErrorSource, ReactiveError};
use crate::graph::{Dep, DepKey, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{TargetId, TargetKind};

type KeyToDep = IndexMap<DepKey, Arc<Dep>>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<TargetId, KeyToDep>> = RefCell::new(HashMap::new());
}

/// Subscribe the running effect to (target, key).
///
/// No-op when no effect is running or tracking is paused.
pub fn track(target: TargetId, op: TrackOp, key: DepKey) {
    if !should_track() {
        return;
    }
    let Some(effect) = ReactiveContext::current_effect() else {
        return;
    };

    let dep = TARGET_MAP.with(|map| {
        map.borrow_mut()
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Dep::new(target, key.clone())))
            .clone()
    });

    if dep.subscribe(&effect) {
        effect.record_dep(dep);
        effect.notify_track(&TrackEvent {
            effect: effect.id(),
            target,
            op,
            key,
        });
    }
}

/// Notify the subscribers affected by a write.
pub fn trigger(event: TriggerEvent) {
    let deps = TARGET_MAP.with(|map| {
        map.borrow()
            .get(&event.target)
            .map(|deps| collect_deps(deps, &event))
            .unwrap_or_default()
    });
    if deps.is_empty() {
        return;
    }

    let running = ReactiveContext::current_effect_id();
    let mut computed: IndexMap<EffectId, ReactiveEffect> = IndexMap::new();
    let mut plain: IndexMap<EffectId, ReactiveEffect> = IndexMap::new();

    for dep in &deps {
        for effect in dep.subscribers() {
            if Some(effect.id()) == running && !effect.allows_recurse() {
                continue;
            }
            let bucket = if effect.is_computed() {
                &mut computed
            } else {
                &mut plain
            };
            bucket.entry(effect.id()).or_insert(effect);
        }
    }

    tracing::trace!(
        target_id = event.target.raw(),
        op = ?event.op,
        effects = computed.len() + plain.len(),
        "trigger"
    );

    // Computed values are invalidated before anything that may read them.
    for effect in computed.values().chain(plain.values()) {
        dispatch(effect, &event);
    }
}

fn collect_deps(deps: &KeyToDep, event: &TriggerEvent) -> SmallVec<[Arc<Dep>; 4]> {
    let mut collected = SmallVec::new();

    if event.op == TriggerOp::Clear {
        collected.extend(deps.values().cloned());
        return collected;
    }

    let is_array = event.kind == Some(TargetKind::Array);

    if is_array && event.key == Some(DepKey::Length) {
        // Shrinking an array also removes every index at or past the new
        // length.
        let new_len = event
            .new_value
            .as_ref()
            .and_then(|value| value.as_index())
            .unwrap_or(0);
        for (key, dep) in deps {
            let affected = match key {
                DepKey::Length => true,
                DepKey::Key(index) => index.as_index().is_some_and(|i| i >= new_len),
                _ => false,
            };
            if affected {
                collected.push(dep.clone());
            }
        }
        return collected;
    }

    let mut add = |key: &DepKey| {
        if let Some(dep) = deps.get(key) {
            collected.push(dep.clone());
        }
    };

    if let Some(key) = &event.key {
        add(key);
    }

    let shape_changed =
        event.op == TriggerOp::Add || (event.op == TriggerOp::Delete && !is_array);

    match event.kind {
        Some(TargetKind::Array) if shape_changed => add(&DepKey::Length),
        Some(TargetKind::Object) if shape_changed => add(&DepKey::Iterate),
        Some(TargetKind::Map) | Some(TargetKind::Set) if shape_changed => {
            add(&DepKey::Iterate);
            add(&DepKey::KeyIterate);
        }
        // Map values are part of iteration, but not of the key set.
        Some(TargetKind::Map) if event.op == TriggerOp::Set => add(&DepKey::Iterate),
        _ => {}
    }

    collected
}

fn dispatch(effect: &ReactiveEffect, event: &TriggerEvent) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        effect.notify_trigger(event);
        match effect.scheduler() {
            Some(scheduler) => scheduler(effect),
            None => {
                effect.run();
            }
        }
    }));

    if let Err(payload) = outcome {
        handle_error(ReactiveError::Panicked {
            origin: ErrorSource::Effect,
            label: effect.label(),
            message: panic_message(payload.as_ref()),
        });
    }
}

/// Drop every Dep of `target`. Called when a target or ref is dropped.
pub(crate) fn forget_target(target: TargetId) {
    let removed = TARGET_MAP
        .try_with(|map| {
            map.try_borrow_mut()
                .ok()
                .and_then(|mut map| map.remove(&target))
        })
        .ok()
        .flatten();

    // Emptying the Deps releases the effects they hold; do it outside the
    // registry borrow since that can drop further targets.
    if let Some(deps) = removed {
        for dep in deps.values() {
            dep.clear();
        }
    }
}

/// Number of effects subscribed to (target, key).
pub fn subscriber_count(target: TargetId, key: &DepKey) -> usize {
    TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map_or(0, |dep| dep.len())
    })
}

/// Whether the registry holds any Dep for `target`.
pub fn is_tracked(target: TargetId) -> bool {
    TARGET_MAP.with(|map| map.borrow().contains_key(&target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::EffectOptions;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_effect(target: TargetId, key: DepKey) -> (ReactiveEffect, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let effect = ReactiveEffect::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            track(target, TrackOp::Get, key.clone());
        });
        (effect, runs)
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let target = TargetId::new();
        track(target, TrackOp::Get, DepKey::key("a"));
        assert!(!is_tracked(target));
    }

    #[test]
    fn trigger_runs_subscribers() {
        let target = TargetId::new();
        let (effect, runs) = counting_effect(target, DepKey::key("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(subscriber_count(target, &DepKey::key("a")), 1);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Set)
                .with_key(DepKey::key("a")),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Unrelated key
        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Set)
                .with_key(DepKey::key("b")),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        effect.stop();
        assert_eq!(subscriber_count(target, &DepKey::key("a")), 0);
    }

    #[test]
    fn add_on_object_triggers_iteration() {
        let target = TargetId::new();
        let (_effect, runs) = counting_effect(target, DepKey::Iterate);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Add)
                .with_key(DepKey::key("new")),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Set)
                .with_key(DepKey::key("new")),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn length_truncation_triggers_removed_indices() {
        let target = TargetId::new();
        let (_kept, kept_runs) = counting_effect(target, DepKey::key(0));
        let (_removed, removed_runs) = counting_effect(target, DepKey::key(3));

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Array), TriggerOp::Set)
                .with_key(DepKey::Length)
                .with_values(Some(Value::from(2)), Some(Value::from(5))),
        );

        assert_eq!(kept_runs.load(Ordering::SeqCst), 1);
        assert_eq!(removed_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn map_set_skips_key_iteration() {
        let target = TargetId::new();
        let (_size, size_runs) = counting_effect(target, DepKey::KeyIterate);
        let (_values, value_runs) = counting_effect(target, DepKey::Iterate);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Map), TriggerOp::Set)
                .with_key(DepKey::key("a")),
        );
        assert_eq!(size_runs.load(Ordering::SeqCst), 1);
        assert_eq!(value_runs.load(Ordering::SeqCst), 2);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Map), TriggerOp::Add)
                .with_key(DepKey::key("b")),
        );
        assert_eq!(size_runs.load(Ordering::SeqCst), 2);
        assert_eq!(value_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn effect_subscribed_twice_runs_once() {
        let target = TargetId::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let _effect = ReactiveEffect::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            track(target, TrackOp::Get, DepKey::key("a"));
            track(target, TrackOp::Iterate, DepKey::Iterate);
        });

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Delete)
                .with_key(DepKey::key("a")),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn scheduler_replaces_synchronous_run() {
        let target = TargetId::new();
        let scheduled = Arc::new(AtomicUsize::new(0));
        let counter = scheduled.clone();
        let effect = ReactiveEffect::with_options(
            move || track(target, TrackOp::Get, DepKey::key("a")),
            EffectOptions::default().with_scheduler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(effect.run_count(), 1);

        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Set)
                .with_key(DepKey::key("a")),
        );
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn panicking_effect_is_reported_and_others_still_run() {
        use crate::error::{clear_error_handler, set_error_handler};
        use std::sync::atomic::AtomicBool;

        let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = errors.clone();
        set_error_handler(move |error| sink.lock().push(error.clone()));

        let target = TargetId::new();
        let armed = Arc::new(AtomicBool::new(false));
        let trap = armed.clone();
        let _failing = ReactiveEffect::with_options(
            move || {
                track(target, TrackOp::Get, DepKey::key("a"));
                if trap.load(Ordering::SeqCst) {
                    panic!("effect failed");
                }
            },
            EffectOptions::default().label("failing"),
        );
        let (_healthy, healthy_runs) = counting_effect(target, DepKey::key("a"));

        armed.store(true, Ordering::SeqCst);
        trigger(
            TriggerEvent::new(target, Some(TargetKind::Object), TriggerOp::Set)
                .with_key(DepKey::key("a")),
        );

        assert_eq!(healthy_runs.load(Ordering::SeqCst), 2);
        let errors = errors.lock().clone();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ReactiveError::Panicked { origin, label, message } => {
                assert_eq!(*origin, ErrorSource::Effect);
                assert_eq!(label, "failing");
                assert_eq!(message, "effect failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        clear_error_handler();
    }

    #[test]
    fn forget_target_clears_deps() {
        let target = TargetId::new();
        let (effect, _) = counting_effect(target, DepKey::key("a"));
        assert!(is_tracked(target));

        forget_target(target);
        assert!(!is_tracked(target));
        assert_eq!(effect.dep_count(), 1);

        // Stopping the effect releases the orphaned Dep
        effect.stop();
        assert_eq!(effect.dep_count(), 0);
    }
}
