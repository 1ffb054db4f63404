//! Reactive Primitives
//!
//! This module implements the effect side of the system: effects, computed
//! values and refs, plus the context and registry that connect them to the
//! observed data in [`crate::observe`].
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that runs whenever the reactive state it read
//! last time changes. Renderers and watchers are built on effects.
//!
//! ## Computed Values
//!
//! A Computed is a derived value that caches its result. It is marked dirty
//! when a dependency changes and re-evaluates on the next read.
//!
//! ## Refs
//!
//! A Ref is a single reactive cell, useful for values that are not objects.
//!
//! # Implementation Notes
//!
//! The system uses a thread-local stack of running effects to detect
//! dependencies automatically. When observed state is read, [`runtime::track`]
//! subscribes the innermost running effect; when it is written,
//! [`runtime::trigger`] re-runs or schedules every subscriber.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod refs;
pub mod runtime;
mod subscriber;

pub use computed::{computed, writable_computed, Computed};
pub use context::{
    enable_tracking, pause_tracking, reset_tracking, should_track, untracked, ReactiveContext,
    TrackingPause,
};
pub use effect::{
    effect, stop, EffectOptions, EffectScheduler, ReactiveEffect, StopHook, TrackHook,
    TriggerHook,
};
pub use refs::{
    create_ref, custom_ref, is_ref, shallow_ref, to_ref, to_refs, trigger_ref, unref,
    CustomRefHandlers, Ref, RefTracker,
};
pub use subscriber::EffectId;
