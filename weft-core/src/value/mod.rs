//! Value Model
//!
//! Rust has no transparent property interception, so reactive data lives in
//! a small dynamic value model. A [`Value`] is either a scalar, a raw
//! [`Target`] (object, array, map or set), an [`Observed`] wrapper over a
//! target, or a [`Ref`].
//!
//! # Equality
//!
//! Values compare with SameValueZero semantics: `NaN` equals `NaN` and `+0`
//! equals `-0`. Targets, wrappers and refs compare by identity, never by
//! content. The same relation is used to decide whether a write changed a
//! value, and to key maps and sets.

mod target;

pub use target::{RawData, Target, TargetId, TargetKind, MAX_ARRAY_LENGTH};
pub(crate) use target::{resize_array, FieldKey};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::observe::Observed;
use crate::reactive::{Computed, Ref};

/// A dynamically typed reactive value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// A raw, unobserved container.
    Target(Target),
    /// An observed wrapper over a raw container.
    Observed(Observed),
    /// A single-value observable cell.
    Ref(Ref),
}

impl Value {
    /// Build a string value.
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Value::String(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an array index, if it is a non-negative integral number.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// The raw target, if this value is one.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Value::Target(target) => Some(target),
            _ => None,
        }
    }

    /// The observed wrapper, if this value is one.
    pub fn observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    /// The ref, if this value is one.
    pub fn reference(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// True for raw targets and observed wrappers: the values that can be
    /// observed.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Target(_) | Value::Observed(_))
    }

    /// A short name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Target(target) => target.kind().name(),
            Value::Observed(observed) => observed.target().kind().name(),
            Value::Ref(_) => "ref",
        }
    }

    /// Read a key. Observed wrappers track the read; raw targets do not.
    /// Other values yield `Null`.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        match self {
            Value::Observed(observed) => observed.get(key),
            Value::Target(target) => target.get(key),
            _ => Value::Null,
        }
    }

    /// Write a key. Observed wrappers trigger subscribers; raw targets are
    /// written silently. Returns false when nothing could be written.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        match self {
            Value::Observed(observed) => observed.set(key, value),
            Value::Target(target) => target.set(key, value),
            _ => {
                dev_warn!(kind = self.type_name(), "cannot set a key on a non-object value");
                false
            }
        }
    }

    /// Remove a key. See [`Value::set`] for the tracking rules.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        match self {
            Value::Observed(observed) => observed.delete(key),
            Value::Target(target) => target.delete(key),
            _ => false,
        }
    }

    /// Whether a key is present.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        match self {
            Value::Observed(observed) => observed.has(key),
            Value::Target(target) => target.contains(key),
            _ => false,
        }
    }

    /// Number of fields, elements or entries. Zero for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::Observed(observed) => observed.len(),
            Value::Target(target) => target.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An untracked JSON snapshot. Refs contribute their current value;
    /// maps become arrays of `[key, value]` pairs and sets become arrays.
    /// Cyclic data is not supported.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Whether a write of `new` over `old` is a change, under SameValueZero.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    new != old
}

fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Target(a), Value::Target(b)) => a.id() == b.id(),
            (Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::String(s) => s.hash(state),
            Value::Target(target) => target.id().hash(state),
            Value::Observed(observed) => observed.identity().hash(state),
            Value::Ref(r) => r.identity().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Target(target) => target.fmt(f),
            Value::Observed(observed) => observed.fmt(f),
            Value::Ref(r) => r.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Target(target) => write!(f, "[{} #{}]", target.kind().name(), target.id().raw()),
            Value::Observed(observed) => write!(
                f,
                "[observed {} #{}]",
                observed.target().kind().name(),
                observed.target().id().raw()
            ),
            Value::Ref(_) => write!(f, "[ref]"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Target(target) => serialize_target(target, serializer),
            Value::Observed(observed) => serialize_target(observed.target(), serializer),
            Value::Ref(r) => r.peek().serialize(serializer),
        }
    }
}

fn serialize_target<S: Serializer>(target: &Target, serializer: S) -> Result<S::Ok, S::Error> {
    // Copy out of the lock first: children may be refs whose reads take
    // other locks.
    let snapshot = target.read().clone();
    match snapshot {
        RawData::Object(fields) => {
            let mut map = serializer.serialize_map(Some(fields.len()))?;
            for (name, value) in &fields {
                map.serialize_entry(name.as_ref(), value)?;
            }
            map.end()
        }
        RawData::Array(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in &items {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
        RawData::Map(entries) => {
            let mut seq = serializer.serialize_seq(Some(entries.len()))?;
            for (key, value) in &entries {
                seq.serialize_element(&(key, value))?;
            }
            seq.end()
        }
        RawData::Set(members) => {
            let mut seq = serializer.serialize_seq(Some(members.len()))?;
            for member in &members {
                seq.serialize_element(member)?;
            }
            seq.end()
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Target(target)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Ref(Ref::from(computed))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

/// Deep conversion: JSON objects and arrays become fresh raw targets.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Target(Target::array_from(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(fields) => Value::Target(Target::object_from(
                fields.into_iter().map(|(name, value)| (name, Value::from(value))),
            )),
        }
    }
}
