//! Dependency Graph
//!
//! This module holds the data structures of the track/trigger engine.
//!
//! # Overview
//!
//! The graph is conceptually `target -> key -> Dep`, where a [`Dep`] is the
//! set of effects that read that (target, key) during their most recent run.
//! Edges are kept in both directions: each Dep knows its subscribers and each
//! effect keeps the Deps it belongs to, so that an effect can leave all of
//! them before it re-runs or when it is stopped.
//!
//! Besides the concrete keys of a target there are synthetic keys
//! ([`DepKey::Length`], [`DepKey::Iterate`], [`DepKey::KeyIterate`]) for
//! reads that depend on the shape of a target rather than one entry.
//!
//! The registry itself and the `track`/`trigger` entry points live in
//! [`crate::reactive::runtime`].

mod dep;
mod ops;

pub use dep::Dep;
pub use ops::{DepKey, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
