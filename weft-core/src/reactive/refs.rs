//! Ref Implementation
//!
//! A Ref is a single reactive cell. It is tracked by its own identity under
//! the implicit key `"value"`, so reading it inside an effect subscribes the
//! effect, and writing a changed value re-runs it.
//!
//! # Ref Sources
//!
//! - Cell: owns a value. Object-like values are stored wrapped with
//!   `reactive` unless the ref is shallow. The raw form is kept alongside to
//!   detect changes.
//! - Field: forwards reads and writes to one key of an object (`to_ref`).
//!   Tracking happens through the object.
//! - Custom: user-supplied get/set that decide when to track and trigger
//!   (`custom_ref`).
//! - Computed: a computed value viewed as a ref.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = create_ref(0);
//!
//! // Read the value
//! let value = count.get();
//!
//! // Update the value (notifies subscribers)
//! count.set(5);
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::computed::Computed;
use super::context::untracked;
use super::runtime::{self, track, trigger};
use crate::graph::{DepKey, TrackOp, TriggerEvent, TriggerOp};
use crate::observe::{is_proxy, reactive, to_raw};
use crate::value::{has_changed, TargetId, Value};

type Getter = Box<dyn Fn() -> Value + Send + Sync>;
type Setter = Box<dyn Fn(Value) + Send + Sync>;

/// The accessors returned by a [`custom_ref`] factory.
pub struct CustomRefHandlers {
    get: Getter,
    set: Setter,
}

impl CustomRefHandlers {
    pub fn new<G, S, R>(get: G, set: S) -> Self
    where
        G: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            get: Box::new(move || get().into()),
            set: Box::new(set),
        }
    }
}

/// Handed to a [`custom_ref`] factory: tracks and triggers the ref being
/// built.
#[derive(Debug, Clone, Copy)]
pub struct RefTracker {
    id: TargetId,
}

impl RefTracker {
    /// Subscribe the running effect to the ref.
    pub fn track(&self) {
        track(self.id, TrackOp::Get, DepKey::value());
    }

    /// Re-run the ref's subscribers.
    pub fn trigger(&self) {
        trigger(TriggerEvent::new(self.id, None, TriggerOp::Set).with_key(DepKey::value()));
    }
}

struct CellState {
    /// Unwrapped form of the last value written.
    raw: Value,
    /// What reads return.
    value: Value,
}

enum RefSource {
    Cell {
        shallow: bool,
        state: RwLock<CellState>,
    },
    Field {
        object: Value,
        key: Value,
    },
    Custom(CustomRefHandlers),
    Computed(Computed),
}

struct RefInner {
    id: TargetId,
    source: RefSource,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        runtime::forget_target(self.id);
    }
}

/// A reactive single-value container. Cloning the handle shares the cell.
#[derive(Clone)]
pub struct Ref {
    inner: Arc<RefInner>,
}

impl Ref {
    fn cell(value: Value, shallow: bool) -> Self {
        let raw = to_raw(&value);
        let value = if shallow { value } else { convert(value) };
        Self::from_source(
            TargetId::new(),
            RefSource::Cell {
                shallow,
                state: RwLock::new(CellState { raw, value }),
            },
        )
    }

    fn from_source(id: TargetId, source: RefSource) -> Self {
        Self {
            inner: Arc::new(RefInner { id, source }),
        }
    }

    /// The ref's own tracking identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Identity used for equality: a ref viewing a computed value is equal
    /// to every other ref over the same computed.
    pub fn identity(&self) -> TargetId {
        match &self.inner.source {
            RefSource::Computed(computed) => computed.id(),
            _ => self.inner.id,
        }
    }

    pub fn is_shallow(&self) -> bool {
        matches!(&self.inner.source, RefSource::Cell { shallow: true, .. })
    }

    /// Read the value, tracking the read.
    pub fn get(&self) -> Value {
        match &self.inner.source {
            RefSource::Cell { state, .. } => {
                track(self.inner.id, TrackOp::Get, DepKey::value());
                state.read().value.clone()
            }
            RefSource::Field { object, key } => object.get(key.clone()),
            RefSource::Custom(handlers) => (handlers.get)(),
            RefSource::Computed(computed) => computed.get(),
        }
    }

    /// Write the value. Subscribers re-run only when the raw value changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        match &self.inner.source {
            RefSource::Cell { shallow, state } => {
                let new_raw = to_raw(&value);
                let replaced = {
                    let mut state = state.write();
                    if !has_changed(&new_raw, &state.raw) {
                        return;
                    }
                    let converted = if *shallow { value } else { convert(value) };
                    let old_raw = std::mem::replace(&mut state.raw, new_raw.clone());
                    let old_value = std::mem::replace(&mut state.value, converted);
                    (old_raw, old_value)
                };
                let (old_raw, _old_value) = replaced;

                trigger(
                    TriggerEvent::new(self.inner.id, None, TriggerOp::Set)
                        .with_key(DepKey::value())
                        .with_values(Some(new_raw), Some(old_raw)),
                );
            }
            RefSource::Field { object, key } => {
                object.set(key.clone(), value);
            }
            RefSource::Custom(handlers) => (handlers.set)(value),
            RefSource::Computed(computed) => computed.set(value),
        }
    }

    /// Read without tracking.
    pub fn peek(&self) -> Value {
        match &self.inner.source {
            RefSource::Cell { state, .. } => state.read().value.clone(),
            _ => untracked(|| self.get()),
        }
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Computed> for Ref {
    fn from(computed: Computed) -> Self {
        Self::from_source(TargetId::new(), RefSource::Computed(computed))
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.inner.source {
            RefSource::Cell { .. } => "cell",
            RefSource::Field { .. } => "field",
            RefSource::Custom(_) => "custom",
            RefSource::Computed(_) => "computed",
        };
        f.debug_struct("Ref")
            .field("id", &self.inner.id.raw())
            .field("source", &source)
            .field("shallow", &self.is_shallow())
            .finish()
    }
}

fn convert(value: Value) -> Value {
    if value.is_object_like() {
        reactive(value)
    } else {
        value
    }
}

/// Create a ref holding `value`. Passing a ref returns that same ref.
pub fn create_ref(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(existing) => existing,
        value => Ref::cell(value, false),
    }
}

/// Create a ref that stores object-like values as given, without wrapping.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(existing) => existing,
        value => Ref::cell(value, true),
    }
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's value for refs, the value itself otherwise.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

/// Re-run the subscribers of a ref without changing it. Used after mutating
/// the contents of a shallow ref in place.
pub fn trigger_ref(r: &Ref) {
    trigger(
        TriggerEvent::new(r.identity(), None, TriggerOp::Set)
            .with_key(DepKey::value())
            .with_values(Some(r.peek()), None),
    );
}

/// A ref bound to one key of `object`.
pub fn to_ref(object: &Value, key: impl Into<Value>) -> Ref {
    Ref::from_source(
        TargetId::new(),
        RefSource::Field {
            object: object.clone(),
            key: key.into(),
        },
    )
}

/// One [`to_ref`] per key of `object`.
pub fn to_refs(object: &Value) -> IndexMap<Value, Ref> {
    if !is_proxy(object) {
        dev_warn!(
            kind = object.type_name(),
            "to_refs() expects a reactive object but received a plain one"
        );
    }
    let keys = match object {
        Value::Observed(observed) => observed.keys(),
        Value::Target(target) => target.keys(),
        _ => Vec::new(),
    };
    keys.into_iter()
        .map(|key| {
            let r = to_ref(object, key.clone());
            (key, r)
        })
        .collect()
}

/// A ref with explicit control over tracking and triggering.
///
/// ```rust,ignore
/// let debounced = custom_ref(|tracker| {
///     let value = Arc::new(Mutex::new(Value::Null));
///     let read = value.clone();
///     CustomRefHandlers::new(
///         move || { tracker.track(); read.lock().clone() },
///         move |new| { *value.lock() = new; tracker.trigger(); },
///     )
/// });
/// ```
pub fn custom_ref<F>(factory: F) -> Ref
where
    F: FnOnce(RefTracker) -> CustomRefHandlers,
{
    let id = TargetId::new();
    let handlers = factory(RefTracker { id });
    Ref::from_source(id, RefSource::Custom(handlers))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
