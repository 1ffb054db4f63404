//! Operation vocabulary shared by track and trigger.

use serde::Serialize;

use crate::reactive::EffectId;
use crate::value::{TargetId, TargetKind, Value};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TriggerOp {
    /// An existing key changed value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// An existing key was removed.
    Delete,
    /// Every entry of a collection was removed.
    Clear,
}

/// Key of a dependency set within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A field name, array index, map key or set member.
    Key(Value),
    /// Length of an array.
    Length,
    /// Enumeration of a target's entries (object keys, map values and
    /// entries).
    Iterate,
    /// Enumeration of a collection's key set, and its size.
    KeyIterate,
}

impl DepKey {
    /// The implicit key of refs and computed values.
    pub fn value() -> Self {
        DepKey::Key(Value::from("value"))
    }

    pub fn key(key: impl Into<Value>) -> Self {
        DepKey::Key(key.into())
    }
}

/// Passed to `on_track` when an effect gains a subscription.
#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub effect: EffectId,
    pub target: TargetId,
    pub op: TrackOp,
    pub key: DepKey,
}

/// Describes one write. Passed to `trigger` and to `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub target: TargetId,
    /// `None` for refs and computed values.
    pub kind: Option<TargetKind>,
    pub op: TriggerOp,
    /// `None` for `Clear`.
    pub key: Option<DepKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

impl TriggerEvent {
    pub fn new(target: TargetId, kind: Option<TargetKind>, op: TriggerOp) -> Self {
        Self {
            target,
            kind,
            op,
            key: None,
            new_value: None,
            old_value: None,
        }
    }

    pub fn with_key(mut self, key: DepKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_values(mut self, new_value: Option<Value>, old_value: Option<Value>) -> Self {
        self.new_value = new_value;
        self.old_value = old_value;
        self
    }
}
