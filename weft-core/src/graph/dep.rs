//! Dependency sets.
//!
//! A [`Dep`] is the set of effects subscribed to one (target, key) pair.
//! Subscribers are kept in subscription order so that triggers run them
//! deterministically.

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::DepKey;
use crate::reactive::{EffectId, ReactiveEffect};
use crate::value::TargetId;

/// Subscribers of one (target, key) pair.
pub struct Dep {
    target: TargetId,
    key: DepKey,
    subscribers: Mutex<IndexMap<EffectId, ReactiveEffect>>,
}

impl Dep {
    pub fn new(target: TargetId, key: DepKey) -> Self {
        Self {
            target,
            key,
            subscribers: Mutex::new(IndexMap::new()),
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn key(&self) -> &DepKey {
        &self.key
    }

    /// Add an effect. Returns false if it was already subscribed.
    pub fn subscribe(&self, effect: &ReactiveEffect) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), effect.clone());
        true
    }

    pub fn unsubscribe(&self, id: EffectId) {
        // The removed handle may be the last one; drop it after the lock is
        // released since dropping an effect can drop targets and deps.
        let removed = self.subscribers.lock().shift_remove(&id);
        drop(removed);
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Snapshot of the current subscribers, in subscription order.
    pub fn subscribers(&self) -> Vec<ReactiveEffect> {
        self.subscribers.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every subscriber.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.subscribers.lock());
        drop(drained);
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("subscribers", &self.len())
            .finish()
    }
}
