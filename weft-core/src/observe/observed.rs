//! The observed wrapper handle.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::{base, collection};
use crate::value::{Target, TargetKind, Value};

/// How a wrapper treats reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ObserveFlags {
    /// Reject writes.
    pub readonly: bool,
    /// Do not wrap nested values or unwrap refs.
    pub shallow: bool,
}

impl ObserveFlags {
    pub const REACTIVE: Self = Self {
        readonly: false,
        shallow: false,
    };
    pub const SHALLOW_REACTIVE: Self = Self {
        readonly: false,
        shallow: true,
    };
    pub const READONLY: Self = Self {
        readonly: true,
        shallow: false,
    };
    pub const SHALLOW_READONLY: Self = Self {
        readonly: true,
        shallow: true,
    };
}

pub(crate) struct ObservedInner {
    target: Target,
    flags: ObserveFlags,
}

/// A tracked view over a [`Target`].
///
/// Reads subscribe the running effect, effective writes trigger
/// subscribers. Cloning the handle keeps the same wrapper identity.
#[derive(Clone)]
pub struct Observed {
    inner: Arc<ObservedInner>,
}

impl Observed {
    pub(super) fn new(target: Target, flags: ObserveFlags) -> Self {
        Self {
            inner: Arc::new(ObservedInner { target, flags }),
        }
    }

    pub(super) fn from_inner(inner: Arc<ObservedInner>) -> Self {
        Self { inner }
    }

    pub(super) fn inner(&self) -> &Arc<ObservedInner> {
        &self.inner
    }

    /// The raw target behind the wrapper.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    pub fn flags(&self) -> ObserveFlags {
        self.inner.flags
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.flags.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.flags.shallow
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.target.kind()
    }

    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address-based identity of the wrapper.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Tracked read of a field, element or map entry.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        if self.kind().is_collection() {
            collection::get(self, key)
        } else {
            base::get(self, key)
        }
    }

    /// Write a field, element or map entry. Returns false when the write
    /// was rejected.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into(), value.into());
        if self.kind().is_collection() {
            collection::set(self, key, value)
        } else {
            base::set(self, key, value)
        }
    }

    /// Remove a key. Returns whether it existed.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::delete(self, key)
        } else {
            base::delete(self, key)
        }
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::has(self, key)
        } else {
            base::has(self, key)
        }
    }

    /// Field count, array length or collection size.
    pub fn len(&self) -> usize {
        if self.kind().is_collection() {
            collection::len(self)
        } else {
            base::len(self)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Value> {
        if self.kind().is_collection() {
            collection::keys(self)
        } else {
            base::keys(self)
        }
    }

    pub fn values(&self) -> Vec<Value> {
        if self.kind().is_collection() {
            collection::values(self)
        } else {
            base::values(self)
        }
    }

    /// `(key, value)` pairs. Set members appear as both key and value.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        if self.kind().is_collection() {
            collection::entries(self)
        } else {
            base::entries(self)
        }
    }

    /// Call `f(value, key)` for every entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }

    /// Add a member to a set.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        collection::add(self, value.into())
    }

    /// Remove every entry of a map or set.
    pub fn clear(&self) {
        collection::clear(self)
    }

    /// Append to an array, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        base::push(self, value.into())
    }

    /// Remove the last element of an array.
    pub fn pop(&self) -> Value {
        base::pop(self)
    }

    /// Truncate or extend an array.
    pub fn set_len(&self, len: usize) -> bool {
        base::set_len(self, len)
    }

    /// Whether an array contains `needle`, comparing raw forms.
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        base::index_of(self, &needle.into()).is_some()
    }

    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        base::index_of(self, &needle.into())
    }

    /// An untracked JSON snapshot of the raw contents.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Target(self.inner.target.clone()).to_json()
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("target", &self.inner.target.id().raw())
            .field("kind", &self.kind())
            .field("flags", &self.inner.flags)
            .finish()
    }
}
