//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive state it
//! read changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazy, the effect runs its function immediately to
//!    establish initial dependencies.
//!
//! 2. Before every run, the effect leaves every Dep it belongs to. During the
//!    run, each tracked read subscribes it again. A branch that is no longer
//!    taken therefore stops triggering the effect.
//!
//! 3. When a dependency changes, the effect is handed to its scheduler if it
//!    has one (usually: queue it as a job), otherwise it re-runs right away.
//!
//! # Stopping
//!
//! `stop()` removes the effect from every Dep and marks it inactive. A
//! stopped effect can still be run by hand; it simply tracks nothing.
//!
//! # Ownership
//!
//! Dependency sets hold their subscribers strongly, so an effect keeps
//! working after its handle is dropped, for as long as it has
//! subscriptions. Stop it to release it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::EffectId;
use crate::graph::{Dep, TrackEvent, TriggerEvent};
use crate::scheduler::{self, Job};
use crate::value::Value;

/// Scheduling hook: called instead of running the effect when it triggers.
pub type EffectScheduler = Arc<dyn Fn(&ReactiveEffect) + Send + Sync>;
/// Debug hook fired when an effect gains a subscription.
pub type TrackHook = Arc<dyn Fn(&TrackEvent) + Send + Sync>;
/// Debug hook fired when an effect is about to be re-run or scheduled.
pub type TriggerHook = Arc<dyn Fn(&TriggerEvent) + Send + Sync>;
/// Fired once when an effect is stopped.
pub type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Options for creating an effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Allow the effect to trigger itself while it is running.
    pub allow_recurse: bool,
    /// Ordering id of the effect's scheduler job.
    pub order: Option<u64>,
    /// Name used in diagnostics.
    pub label: Option<String>,
    pub scheduler: Option<EffectScheduler>,
    pub on_track: Option<TrackHook>,
    pub on_trigger: Option<TriggerHook>,
    pub on_stop: Option<StopHook>,
    pub(crate) computed: bool,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn order(mut self, order: u64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&ReactiveEffect) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Defer re-runs to the job queue: the effect's [`ReactiveEffect::job`]
    /// is queued on trigger, so any number of writes before the next flush
    /// cause one run.
    pub fn queued(self) -> Self {
        self.with_scheduler(|effect| scheduler::queue_job(effect.job()))
    }

    pub fn on_track<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TrackEvent) + Send + Sync + 'static,
    {
        self.on_track = Some(Arc::new(hook));
        self
    }

    pub fn on_trigger<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TriggerEvent) + Send + Sync + 'static,
    {
        self.on_trigger = Some(Arc::new(hook));
        self
    }

    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(hook));
        self
    }

    pub(crate) fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("allow_recurse", &self.allow_recurse)
            .field("order", &self.order)
            .field("label", &self.label)
            .field("scheduler", &self.scheduler.is_some())
            .field("computed", &self.computed)
            .finish()
    }
}

struct EffectInner {
    id: EffectId,
    func: Box<dyn Fn() -> Value + Send + Sync>,
    /// Deps this effect belongs to, rebuilt on every run.
    deps: Mutex<Vec<Arc<Dep>>>,
    active: AtomicBool,
    run_count: AtomicUsize,
    options: EffectOptions,
    job: OnceLock<Job>,
}

/// A reactive computation. Cloning the handle shares the effect.
#[derive(Clone)]
pub struct ReactiveEffect {
    inner: Arc<EffectInner>,
}

impl ReactiveEffect {
    /// Create an effect and run it immediately.
    pub fn new<F, R>(func: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::with_options(func, EffectOptions::default())
    }

    /// Create an effect without running it.
    pub fn new_lazy<F, R>(func: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::with_options(func, EffectOptions::default().lazy())
    }

    pub fn with_options<F, R>(func: F, options: EffectOptions) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let lazy = options.lazy;
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                func: Box::new(move || func().into()),
                deps: Mutex::new(Vec::new()),
                active: AtomicBool::new(true),
                run_count: AtomicUsize::new(0),
                options,
                job: OnceLock::new(),
            }),
        };

        if !lazy {
            effect.run();
        }
        effect
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the function, tracking its reads, and return its result.
    ///
    /// A run requested while the same effect is already on the stack is
    /// skipped and yields `Null`.
    pub fn run(&self) -> Value {
        if !self.is_active() {
            return (self.inner.func)();
        }
        if ReactiveContext::contains(self.id()) {
            tracing::trace!(effect = %self.id(), "skipping re-entrant effect run");
            return Value::Null;
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(self);
        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
        (self.inner.func)()
    }

    /// Unsubscribe from everything and deactivate. Idempotent.
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            if let Some(on_stop) = &self.inner.options.on_stop {
                on_stop();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// The scheduler job that re-runs this effect. The same job is returned
    /// every time, so queueing it repeatedly before a flush runs it once.
    /// The job skips stopped effects.
    pub fn job(&self) -> Job {
        self.inner
            .job
            .get_or_init(|| {
                let weak = Arc::downgrade(&self.inner);
                let job = Job::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        let effect = ReactiveEffect { inner };
                        if effect.is_active() {
                            effect.run();
                        }
                    }
                })
                .with_label(self.label());
                match self.inner.options.order {
                    Some(order) => job.with_order(order),
                    None => job,
                }
            })
            .clone()
    }

    /// Number of completed and in-progress tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of Deps the effect currently belongs to.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    pub fn label(&self) -> String {
        self.inner
            .options
            .label
            .clone()
            .unwrap_or_else(|| self.id().to_string())
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.inner.options.computed
    }

    pub(crate) fn allows_recurse(&self) -> bool {
        self.inner.options.allow_recurse
    }

    pub(crate) fn scheduler(&self) -> Option<EffectScheduler> {
        self.inner.options.scheduler.clone()
    }

    pub(crate) fn record_dep(&self, dep: Arc<Dep>) {
        self.inner.deps.lock().push(dep);
    }

    pub(crate) fn notify_track(&self, event: &TrackEvent) {
        if let Some(on_track) = &self.inner.options.on_track {
            on_track(event);
        }
    }

    pub(crate) fn notify_trigger(&self, event: &TriggerEvent) {
        if let Some(on_trigger) = &self.inner.options.on_trigger {
            on_trigger(event);
        }
    }

    /// Leave every Dep.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.lock());
        for dep in &deps {
            dep.unsubscribe(self.id());
        }
    }
}

impl PartialEq for ReactiveEffect {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ReactiveEffect {}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dep_count", &self.dep_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect. Runs immediately unless `options.lazy`.
pub fn effect<F, R>(func: F, options: EffectOptions) -> ReactiveEffect
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
{
    ReactiveEffect::with_options(func, options)
}

/// Stop an effect. See [`ReactiveEffect::stop`].
pub fn stop(effect: &ReactiveEffect) {
    effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::reactive;
    use crate::value::Target;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = ReactiveEffect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = ReactiveEffect::new_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should not have run
        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        // Manually run
        effect.run();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn run_returns_function_result() {
        let effect = ReactiveEffect::new_lazy(|| 21 * 2);
        assert_eq!(effect.run(), Value::from(42));
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let state = reactive(Target::object_from([("a", 1)]));
        let seen = Arc::new(AtomicI32::new(0));

        let reader = state.clone();
        let sink = seen.clone();
        let effect = ReactiveEffect::new(move || {
            let value = reader.get("a").as_f64().unwrap_or_default();
            sink.store(value as i32, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        state.set("a", 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn stale_branches_are_dropped() {
        let state = reactive(Target::object_from([
            ("flag", Value::from(true)),
            ("a", Value::from(1)),
            ("b", Value::from(2)),
        ]));

        let reader = state.clone();
        let effect = ReactiveEffect::new(move || {
            if reader.get("flag") == Value::from(true) {
                reader.get("a")
            } else {
                reader.get("b")
            }
        });
        assert_eq!(effect.dep_count(), 2);

        state.set("flag", false);
        assert_eq!(effect.run_count(), 2);

        // "a" is no longer read, so writing it does nothing
        state.set("a", 10);
        assert_eq!(effect.run_count(), 2);

        state.set("b", 20);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn stopped_effect_does_not_rerun() {
        let state = reactive(Target::object_from([("a", 1)]));
        let stops = Arc::new(AtomicI32::new(0));
        let stop_sink = stops.clone();

        let reader = state.clone();
        let effect = ReactiveEffect::with_options(
            move || reader.get("a"),
            EffectOptions::default().on_stop(move || {
                stop_sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        effect.stop();
        effect.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!effect.is_active());
        assert_eq!(effect.dep_count(), 0);

        state.set("a", 2);
        assert_eq!(effect.run_count(), 1);

        // Running by hand still executes, without tracking
        assert_eq!(effect.run(), Value::from(2));
        assert_eq!(effect.dep_count(), 0);
    }

    #[test]
    fn effect_does_not_retrigger_itself() {
        let state = reactive(Target::object_from([("n", 0)]));

        let writer = state.clone();
        let effect = ReactiveEffect::new(move || {
            let n = writer.get("n").as_f64().unwrap_or_default();
            writer.set("n", n + 1.0);
        });

        assert_eq!(effect.run_count(), 1);
        assert_eq!(state.get("n"), Value::from(1));
    }

    #[test]
    fn nested_effects_restore_outer_tracking() {
        let state = reactive(Target::object_from([("inner", 1), ("outer", 1)]));

        let inner_reader = state.clone();
        let outer_reader = state.clone();
        let outer = ReactiveEffect::new(move || {
            let inner_state = inner_reader.clone();
            let inner = ReactiveEffect::new_lazy(move || inner_state.get("inner"));
            inner.run();
            inner.stop();
            outer_reader.get("outer")
        });

        // Only "outer" belongs to the outer effect
        assert_eq!(outer.dep_count(), 1);
        state.set("inner", 2);
        assert_eq!(outer.run_count(), 1);
        state.set("outer", 2);
        assert_eq!(outer.run_count(), 2);
    }

    #[test]
    fn debugger_hooks_fire() {
        let state = reactive(Target::object_from([("a", 1)]));
        let tracked = Arc::new(AtomicI32::new(0));
        let triggered = Arc::new(AtomicI32::new(0));

        let reader = state.clone();
        let track_sink = tracked.clone();
        let trigger_sink = triggered.clone();
        let _effect = ReactiveEffect::with_options(
            move || reader.get("a"),
            EffectOptions::default()
                .on_track(move |_| {
                    track_sink.fetch_add(1, Ordering::SeqCst);
                })
                .on_trigger(move |event| {
                    assert_eq!(event.new_value, Some(Value::from(2)));
                    trigger_sink.fetch_add(1, Ordering::SeqCst);
                }),
        );
        assert_eq!(tracked.load(Ordering::SeqCst), 1);

        state.set("a", 2);
        assert_eq!(triggered.load(Ordering::SeqCst), 1);
        assert_eq!(tracked.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn job_is_stable() {
        let effect = ReactiveEffect::new_lazy(|| ());
        assert_eq!(effect.job().id(), effect.job().id());
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = ReactiveEffect::new(|| ());
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect1.run_count(), 1);

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }
}
