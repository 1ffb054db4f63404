//! Computed Values
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. The getter runs inside a lazy effect, so nothing happens until the
//!    first read.
//!
//! 2. Reading a dirty computed runs the getter, caches the result and clears
//!    the dirty flag. Reading a clean one returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler only sets the dirty
//!    flag, then triggers the computed's own subscribers. The getter is not
//!    run until somebody reads the value again.
//!
//! Readers of a computed subscribe to it under the implicit `"value"` key,
//! exactly like a ref.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::effect::{EffectOptions, ReactiveEffect};
use super::runtime::{self, track, trigger};
use crate::graph::{DepKey, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{TargetId, Value};

type Setter = Box<dyn Fn(Value) + Send + Sync>;

struct ComputedInner {
    id: TargetId,
    dirty: AtomicBool,
    value: RwLock<Value>,
    effect: ReactiveEffect,
    setter: Option<Setter>,
}

impl Drop for ComputedInner {
    fn drop(&mut self) {
        self.effect.stop();
        runtime::forget_target(self.id);
    }
}

/// A lazily evaluated, cached derived value.
///
/// Cloning the handle shares the cache.
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

impl Computed {
    /// Read-only computed value.
    pub fn new<F, R>(getter: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::build(getter, None)
    }

    /// Computed value whose writes go to `setter`.
    pub fn with_setter<F, R, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F, R>(getter: F, setter: Option<Setter>) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ComputedInner>| {
            let weak = weak.clone();
            let options = EffectOptions::default()
                .lazy()
                .computed()
                .with_scheduler(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        if !inner.dirty.swap(true, Ordering::SeqCst) {
                            trigger(
                                TriggerEvent::new(inner.id, None, TriggerOp::Set)
                                    .with_key(DepKey::value()),
                            );
                        }
                    }
                });

            ComputedInner {
                id: TargetId::new(),
                dirty: AtomicBool::new(true),
                value: RwLock::new(Value::Null),
                effect: ReactiveEffect::with_options(getter, options),
                setter,
            }
        });

        Self { inner }
    }

    /// Identity used for tracking reads of this computed.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Current value, recomputing first if a dependency changed.
    pub fn get(&self) -> Value {
        // Stays dirty if the getter panics.
        if self.inner.dirty.load(Ordering::SeqCst) {
            let value = self.inner.effect.run();
            *self.inner.value.write() = value;
            self.inner.dirty.store(false, Ordering::SeqCst);
        }
        track(self.inner.id, TrackOp::Get, DepKey::value());
        self.inner.value.read().clone()
    }

    /// Write through the setter. Read-only computed values ignore the write.
    pub fn set(&self, value: impl Into<Value>) {
        match &self.inner.setter {
            Some(setter) => setter(value.into()),
            None => {
                dev_warn!(
                    computed = self.inner.id.raw(),
                    "write operation failed: computed value is readonly"
                );
            }
        }
    }

    /// The cached value, without recomputing or tracking.
    pub fn peek(&self) -> Value {
        self.inner.value.read().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }

    pub fn ptr_eq(&self, other: &Computed) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id.raw())
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

/// Create a read-only computed value.
pub fn computed<F, R>(getter: F) -> Computed
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
{
    Computed::new(getter)
}

/// Create a computed value with a setter.
pub fn writable_computed<F, R, S>(getter: F, setter: S) -> Computed
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
    S: Fn(Value) + Send + Sync + 'static,
{
    Computed::with_setter(getter, setter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
