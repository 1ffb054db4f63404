//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be tracked at all.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. When an effect runs, it
//! is pushed onto the stack; when it completes, it is popped. Nested runs
//! (an effect reading a computed value, which runs its own effect) restore
//! the outer effect on completion.
//!
//! A second stack records the "should track" flag so that sections of code
//! can read reactive state without subscribing. Pauses nest: each
//! [`pause_tracking`] or [`enable_tracking`] pushes the previous flag and
//! [`reset_tracking`] restores it.
//!
//! Both stacks are driven through guards that release on drop, so a panic
//! inside user code never leaves them unbalanced.

use std::cell::{Cell, RefCell};

use super::{EffectId, ReactiveEffect};

thread_local! {
    static EFFECT_STACK: RefCell<Vec<ReactiveEffect>> = const { RefCell::new(Vec::new()) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the running effect when dropped.
///
/// Entering also enables tracking for the duration of the run, even inside
/// an untracked section.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Make `effect` the active effect until the guard is dropped.
    pub fn enter(effect: &ReactiveEffect) -> Self {
        enable_tracking();
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        Self {
            effect_id: effect.id(),
        }
    }

    /// Check if an effect is running.
    pub fn is_active() -> bool {
        EFFECT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<ReactiveEffect> {
        EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// ID of the innermost running effect, if any.
    pub fn current_effect_id() -> Option<EffectId> {
        EFFECT_STACK.with(|stack| stack.borrow().last().map(ReactiveEffect::id))
    }

    /// Whether `id` is anywhere on the stack.
    pub fn contains(id: EffectId) -> bool {
        EFFECT_STACK.with(|stack| stack.borrow().iter().any(|effect| effect.id() == id))
    }

    /// Number of nested runs in progress.
    pub fn depth() -> usize {
        EFFECT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // `try_with`: guards may be dropped during thread teardown.
        let popped = EFFECT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        if let Some(effect) = &popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
        drop(popped);
        reset_tracking();
    }
}

/// Stop tracking reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    push_tracking(false);
}

/// Track reads until the matching [`reset_tracking`], even inside a paused
/// section.
pub fn enable_tracking() {
    push_tracking(true);
}

/// Restore the tracking flag saved by the last pause or enable.
pub fn reset_tracking() {
    let previous = TRACK_STACK
        .try_with(|stack| stack.borrow_mut().pop())
        .ok()
        .flatten();
    let _ = SHOULD_TRACK.try_with(|flag| flag.set(previous.unwrap_or(true)));
}

/// Whether reads are currently being tracked.
pub fn should_track() -> bool {
    SHOULD_TRACK.with(Cell::get)
}

fn push_tracking(enabled: bool) {
    let current = SHOULD_TRACK.with(Cell::get);
    TRACK_STACK.with(|stack| stack.borrow_mut().push(current));
    SHOULD_TRACK.with(|flag| flag.set(enabled));
}

/// Guard form of [`pause_tracking`] / [`reset_tracking`].
pub struct TrackingPause {
    _private: (),
}

impl TrackingPause {
    pub fn new() -> Self {
        pause_tracking();
        Self { _private: () }
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without tracking any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::EffectOptions;

    fn lazy_effect() -> ReactiveEffect {
        ReactiveEffect::with_options(|| (), EffectOptions::default().lazy())
    }

    #[test]
    fn context_tracks_effect() {
        let effect = lazy_effect();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect_id().is_none());

        {
            let _ctx = ReactiveContext::enter(&effect);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_effect_id(), Some(effect.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect_id().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = lazy_effect();
        let inner = lazy_effect();

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current_effect_id(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current_effect_id(), Some(inner.id()));
                assert!(ReactiveContext::contains(outer.id()));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_effect_id(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_effect_id().is_none());
    }

    #[test]
    fn pauses_nest() {
        assert!(should_track());
        pause_tracking();
        assert!(!should_track());
        enable_tracking();
        assert!(should_track());
        reset_tracking();
        assert!(!should_track());
        reset_tracking();
        assert!(should_track());
    }

    #[test]
    fn entering_an_effect_enables_tracking_inside_a_pause() {
        let effect = lazy_effect();
        untracked(|| {
            assert!(!should_track());
            {
                let _ctx = ReactiveContext::enter(&effect);
                assert!(should_track());
            }
            assert!(!should_track());
        });
        assert!(should_track());
    }

    #[test]
    fn guards_release_on_panic() {
        let effect = lazy_effect();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _pause = TrackingPause::new();
            let _ctx = ReactiveContext::enter(&effect);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
        assert!(should_track());
    }
}
