//! Weft Core
//!
//! This crate provides the core runtime for the Weft fine-grained reactive
//! state engine. It implements:
//!
//! - Observed wrappers over plain data (objects, arrays, maps, sets)
//! - Automatic dependency tracking (track / trigger)
//! - Reactive effects, computed values and refs
//! - A deduplicating, ordered job scheduler
//!
//! The crate is an in-process library only. Renderers, component managers and
//! watchers sit on top of it and use a handful of primitives: wrap a value,
//! run a function while tracking what it reads, and flush queued re-runs.
//!
//! # Architecture
//!
//! - `value`: the dynamic value model and raw targets
//! - `observe`: reactive / readonly wrappers and their interception handlers
//! - `graph`: dependency sets and the operation vocabulary of track/trigger
//! - `reactive`: the active-effect context, effects, computed values, refs
//! - `scheduler`: the batched job queue and `next_tick`
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{effect, reactive, EffectOptions, Target, Value};
//!
//! let state = reactive(Target::object_from([("count", Value::from(0))]));
//!
//! let reader = state.clone();
//! let _effect = effect(
//!     move || println!("count is {:?}", reader.get("count")),
//!     EffectOptions::default(),
//! );
//!
//! state.set("count", 5);
//! // Effect runs synchronously, prints: "count is Number(5.0)"
//! ```
//!
//! # Flushing
//!
//! Effects without a scheduler re-run synchronously inside the write that
//! triggered them. Queued work (effects built with
//! [`EffectOptions::queued`], jobs passed to [`queue_job`], post-flush
//! callbacks) never runs on its own: there is no event loop or microtask
//! queue in the crate, so the host drives the flush. Call [`flush_jobs`] at
//! the end of each batch of writes, or await [`next_tick`], which performs
//! the pending flush when polled. [`has_pending_flush`] reports whether
//! anything is waiting.
//!
//! # Threading
//!
//! Every runtime singleton (effect stack, dependency registry, job queue,
//! configuration, error handler) is thread-local. Reactive state is meant to
//! be created, observed and flushed on one thread.

/// Emit a misuse diagnostic when dev warnings are enabled.
macro_rules! dev_warn {
    ($($arg:tt)*) => {
        if $crate::config::dev_warnings() {
            tracing::warn!($($arg)*);
        }
    };
}

pub mod config;
pub mod error;
pub mod graph;
pub mod observe;
pub mod reactive;
pub mod scheduler;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{clear_error_handler, handle_error, set_error_handler, ErrorSource, ReactiveError};
pub use graph::{DepKey, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
pub use observe::{
    is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, ObserveFlags, Observed,
};
pub use reactive::{
    computed, create_ref, custom_ref, effect, enable_tracking, is_ref, pause_tracking,
    reset_tracking, shallow_ref, stop, to_ref, to_refs, trigger_ref, unref, untracked,
    writable_computed, Computed, CustomRefHandlers, EffectId, EffectOptions, ReactiveEffect,
    Ref, RefTracker,
};
pub use scheduler::{
    flush_jobs, flush_post_flush_cbs, has_pending_flush, invalidate_job, is_flushing, next_tick,
    next_tick_with, queue_job, queue_post_flush_cb, queue_post_flush_cbs, FlushState, Job, JobId,
    NextTick,
};
pub use value::{Target, TargetId, TargetKind, Value, MAX_ARRAY_LENGTH};
