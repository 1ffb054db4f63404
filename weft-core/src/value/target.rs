//! Raw Targets
//!
//! A [`Target`] is the unobserved ground truth behind every wrapper: a shared,
//! identity-bearing container holding an object, array, map or set.
//!
//! Each target carries its own identity registry entries: the skip mark set
//! by `mark_raw`, the frozen mark, and weak back-references to the reactive
//! and readonly wrappers created for it. Because those entries live inside
//! the target, the mapping from raw value to wrapper lives exactly as long as
//! the raw value. Dropping the last handle also removes the target's
//! dependency sets from the tracking registry.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;

use super::Value;
use crate::observe::Observers;
use crate::reactive::runtime;

/// Largest array length, as in JavaScript (2^32 - 1). Valid indices are
/// below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Resize `items` to `len`, padding with `Null`. Returns false, leaving
/// `items` untouched, when `len` is over [`MAX_ARRAY_LENGTH`] or the memory
/// cannot be reserved.
pub(crate) fn resize_array(items: &mut Vec<Value>, len: usize) -> bool {
    if len > MAX_ARRAY_LENGTH {
        return false;
    }
    if len > items.len() && items.try_reserve(len - items.len()).is_err() {
        return false;
    }
    items.resize(len, Value::Null);
    true
}

/// Stable identity token of a target (or of a ref, which is tracked the same
/// way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shape of a target, fixed when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetKind {
    Object,
    Array,
    Map,
    Set,
}

impl TargetKind {
    pub fn name(&self) -> &'static str {
        match self {
            TargetKind::Object => "object",
            TargetKind::Array => "array",
            TargetKind::Map => "map",
            TargetKind::Set => "set",
        }
    }

    /// Maps and sets expose methods rather than fields.
    pub fn is_collection(&self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::Set)
    }
}

/// The contents of a target.
#[derive(Debug, Clone)]
pub enum RawData {
    Object(IndexMap<Arc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

impl RawData {
    pub fn kind(&self) -> TargetKind {
        match self {
            RawData::Object(_) => TargetKind::Object,
            RawData::Array(_) => TargetKind::Array,
            RawData::Map(_) => TargetKind::Map,
            RawData::Set(_) => TargetKind::Set,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawData::Object(fields) => fields.len(),
            RawData::Array(items) => items.len(),
            RawData::Map(entries) => entries.len(),
            RawData::Set(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field names, indices, map keys or set members, in order.
    pub fn keys(&self) -> Vec<Value> {
        match self {
            RawData::Object(fields) => fields.keys().cloned().map(Value::String).collect(),
            RawData::Array(items) => (0..items.len()).map(Value::from).collect(),
            RawData::Map(entries) => entries.keys().cloned().collect(),
            RawData::Set(members) => members.iter().cloned().collect(),
        }
    }

    pub(crate) fn get_field(&self, key: &FieldKey) -> Option<Value> {
        match (self, key) {
            (RawData::Object(fields), FieldKey::Name(name)) => fields.get(name).cloned(),
            (RawData::Array(items), FieldKey::Index(index)) => items.get(*index).cloned(),
            (RawData::Array(items), FieldKey::Length) => Some(Value::from(items.len())),
            _ => None,
        }
    }

    pub(crate) fn has_field(&self, key: &FieldKey) -> bool {
        match (self, key) {
            (RawData::Object(fields), FieldKey::Name(name)) => fields.contains_key(name),
            (RawData::Array(items), FieldKey::Index(index)) => *index < items.len(),
            (RawData::Array(_), FieldKey::Length) => true,
            _ => false,
        }
    }

    /// Make room for a write to `key`. Only an array index past the end
    /// needs memory; false means the write must not happen.
    pub(crate) fn reserve_field(&mut self, key: &FieldKey) -> bool {
        match (self, key) {
            (RawData::Array(items), FieldKey::Index(index)) if *index >= items.len() => {
                items.try_reserve(*index + 1 - items.len()).is_ok()
            }
            _ => true,
        }
    }

    /// Write a field, returning the previous value. Writing an array index
    /// past the end pads the gap with `Null`.
    pub(crate) fn set_field(&mut self, key: &FieldKey, value: Value) -> Option<Value> {
        match (self, key) {
            (RawData::Object(fields), FieldKey::Name(name)) => fields.insert(name.clone(), value),
            (RawData::Array(items), FieldKey::Index(index)) => {
                if *index < items.len() {
                    Some(std::mem::replace(&mut items[*index], value))
                } else {
                    items.resize(*index, Value::Null);
                    items.push(value);
                    None
                }
            }
            _ => None,
        }
    }

    /// Remove a field. Array elements leave a `Null` hole behind.
    pub(crate) fn remove_field(&mut self, key: &FieldKey) -> Option<Value> {
        match (self, key) {
            (RawData::Object(fields), FieldKey::Name(name)) => fields.shift_remove(name),
            (RawData::Array(items), FieldKey::Index(index)) if *index < items.len() => {
                Some(std::mem::take(&mut items[*index]))
            }
            _ => None,
        }
    }
}

/// A resolved key of an object or array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldKey {
    Name(Arc<str>),
    Index(usize),
    Length,
}

impl FieldKey {
    /// Resolve a key for a target of the given kind. Object keys are
    /// stringified; arrays accept integral indices and `"length"`.
    pub(crate) fn resolve(kind: TargetKind, key: &Value) -> Option<FieldKey> {
        match kind {
            TargetKind::Object => match key {
                Value::String(name) => Some(FieldKey::Name(name.clone())),
                Value::Null | Value::Bool(_) | Value::Number(_) => {
                    Some(FieldKey::Name(Arc::from(key.to_string())))
                }
                _ => None,
            },
            TargetKind::Array => match key {
                Value::String(name) if name.as_ref() == "length" => Some(FieldKey::Length),
                Value::String(name) => name
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index < MAX_ARRAY_LENGTH)
                    .map(FieldKey::Index),
                other => other
                    .as_index()
                    .filter(|index| *index < MAX_ARRAY_LENGTH)
                    .map(FieldKey::Index),
            },
            TargetKind::Map | TargetKind::Set => None,
        }
    }

    /// The key as stored in dependency sets.
    pub(crate) fn to_value(&self) -> Value {
        match self {
            FieldKey::Name(name) => Value::String(name.clone()),
            FieldKey::Index(index) => Value::from(*index),
            FieldKey::Length => Value::from("length"),
        }
    }
}

struct TargetInner {
    id: TargetId,
    kind: TargetKind,
    data: RwLock<RawData>,
    skip: AtomicBool,
    frozen: AtomicBool,
    observers: Mutex<Observers>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        runtime::forget_target(self.id);
    }
}

/// A shared handle to raw data. Cloning the handle shares the data.
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetInner>,
}

impl Target {
    /// Wrap raw data in a new target with a fresh identity.
    pub fn new(data: RawData) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::new(),
                kind: data.kind(),
                data: RwLock::new(data),
                skip: AtomicBool::new(false),
                frozen: AtomicBool::new(false),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    pub fn object() -> Self {
        Self::new(RawData::Object(IndexMap::new()))
    }

    pub fn array() -> Self {
        Self::new(RawData::Array(Vec::new()))
    }

    pub fn map() -> Self {
        Self::new(RawData::Map(IndexMap::new()))
    }

    pub fn new_set() -> Self {
        Self::new(RawData::Set(IndexSet::new()))
    }

    /// An object with the given fields, in order.
    pub fn object_from<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<Value>,
    {
        Self::new(RawData::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ))
    }

    pub fn array_from<V, I>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(RawData::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::new(RawData::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn set_from<V, I>(members: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(RawData::Set(members.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.kind
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Freeze the target: it can no longer be wrapped. Existing wrappers are
    /// unaffected.
    pub fn freeze(&self) -> &Self {
        self.inner.frozen.store(true, Ordering::SeqCst);
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_skip(&self) {
        self.inner.skip.store(true, Ordering::SeqCst);
    }

    /// Whether `mark_raw` excluded this target from observation.
    pub fn is_skipped(&self) -> bool {
        self.inner.skip.load(Ordering::SeqCst)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RawData> {
        self.inner.data.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RawData> {
        self.inner.data.write()
    }

    pub(crate) fn observers(&self) -> MutexGuard<'_, Observers> {
        self.inner.observers.lock()
    }

    /// A copy of the raw contents.
    pub fn snapshot(&self) -> RawData {
        self.read().clone()
    }

    /// Untracked read of a field, element or map entry.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        let data = self.read();
        let value = match &*data {
            RawData::Map(entries) => entries.get(&key).cloned(),
            RawData::Set(_) => None,
            other => FieldKey::resolve(self.kind(), &key).and_then(|field| other.get_field(&field)),
        };
        value.unwrap_or_default()
    }

    /// Untracked write. Nothing is triggered; use an observed wrapper to
    /// notify subscribers. Sets accept the value as a new member and ignore
    /// `key`.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let mut data = self.write();
        match &mut *data {
            RawData::Map(entries) => {
                entries.insert(key, value.into());
                true
            }
            RawData::Set(members) => members.insert(value.into()),
            other => match FieldKey::resolve(self.kind(), &key) {
                Some(FieldKey::Length) => match (other, value.into().as_index()) {
                    (RawData::Array(items), Some(len)) => resize_array(items, len),
                    _ => false,
                },
                Some(field) => {
                    if !other.reserve_field(&field) {
                        return false;
                    }
                    other.set_field(&field, value.into());
                    true
                }
                None => false,
            },
        }
    }

    /// Untracked removal.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        let mut data = self.write();
        match &mut *data {
            RawData::Map(entries) => entries.shift_remove(&key).is_some(),
            RawData::Set(members) => members.shift_remove(&key),
            other => FieldKey::resolve(self.kind(), &key)
                .and_then(|field| other.remove_field(&field))
                .is_some(),
        }
    }

    /// Untracked presence check.
    pub fn contains(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        let data = self.read();
        match &*data {
            RawData::Map(entries) => entries.contains_key(&key),
            RawData::Set(members) => members.contains(&key),
            other => FieldKey::resolve(self.kind(), &key)
                .map(|field| other.has_field(&field))
                .unwrap_or(false),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked keys, in order.
    pub fn keys(&self) -> Vec<Value> {
        self.read().keys()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id.raw())
            .field("kind", &self.inner.kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = Target::object();
        let b = Target::object();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn object_fields_keep_insertion_order() {
        let target = Target::object_from([("b", 1), ("a", 2)]);
        target.set("c", 3);
        assert_eq!(
            target.keys(),
            vec![Value::from("b"), Value::from("a"), Value::from("c")]
        );
        assert!(target.delete("a"));
        assert!(!target.contains("a"));
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn array_writes_past_the_end_pad_with_null() {
        let target = Target::array_from([1, 2]);
        target.set(4, 5);
        assert_eq!(target.len(), 5);
        assert_eq!(target.get(2), Value::Null);
        assert_eq!(target.get(4), Value::from(5));
        assert_eq!(target.get("length"), Value::from(5));

        target.set("length", 1);
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn array_delete_leaves_a_hole() {
        let target = Target::array_from(["a", "b"]);
        assert!(target.delete(0));
        assert_eq!(target.len(), 2);
        assert_eq!(target.get(0), Value::Null);
    }

    #[test]
    fn map_and_set_use_value_keys() {
        let key = Target::object();
        let map = Target::map();
        map.set(key.clone(), "object key");
        map.set(f64::NAN, "nan key");
        assert_eq!(map.get(key), Value::from("object key"));
        assert_eq!(map.get(f64::NAN), Value::from("nan key"));

        let set = Target::set_from([1, 2]);
        assert!(set.contains(2));
        assert!(!set.set(Value::Null, 2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn object_keys_are_stringified() {
        let target = Target::object();
        target.set(1, "one");
        assert_eq!(target.get("1"), Value::from("one"));
    }

    #[test]
    fn freeze_marks_target() {
        let target = Target::object();
        assert!(!target.is_frozen());
        target.freeze();
        assert!(target.is_frozen());
    }
}
