//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that can sit in a dependency set: plain
//! effects, the effect behind a computed value, render functions. The
//! registry and the trigger fan-out only ever see subscribers through the
//! type-erased [`Reactive`] trait, so effects with different return types can
//! share one dependency set.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::dep::Dep;
use super::operations::DebuggerEvent;

/// Unique identifier for an effect.
///
/// Ids are handed out from a process-wide counter, so they increase
/// monotonically in creation order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A computation that can be subscribed to dependency sets.
///
/// Implemented by the record behind every `ReactiveEffect<T>`.
pub(crate) trait Reactive {
    /// The subscriber's identity.
    fn id(&self) -> EffectId;

    /// False once the effect has been stopped.
    fn is_active(&self) -> bool;

    /// Whether a trigger raised by this effect's own run may schedule it.
    fn allow_recurse(&self) -> bool;

    /// Record that this subscriber joined `dep`, so cleanup can find it.
    fn link(&self, dep: &Rc<Dep>);

    /// Whether an `on_track` hook is configured.
    fn observes_track(&self) -> bool;

    /// Whether an `on_trigger` hook is configured.
    fn observes_trigger(&self) -> bool;

    fn on_track(&self, event: &DebuggerEvent);

    fn on_trigger(&self, event: &DebuggerEvent);

    /// Hand the subscriber to its scheduler, or run it right away.
    fn schedule(self: Rc<Self>);
}
