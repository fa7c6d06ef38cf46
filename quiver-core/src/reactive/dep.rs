//! Dependency Sets
//!
//! A [`Dep`] holds the effects subscribed to one observed (object, key)
//! pair. Observed objects are identified by [`TargetId`] and keys by
//! [`DepKey`].
//!
//! # Ordering
//!
//! Subscribers are kept in insertion order. Trigger fan-out walks the matched
//! sets in order and merges them first-seen, so the run order of effects is
//! deterministic.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;

use super::subscriber::{EffectId, Reactive};

/// Identity of an observed object.
///
/// Derived from the address of the object's `Rc` allocation. The registry
/// pairs it with a weak reference so a reused address is never mistaken for
/// the object that used to live there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetId(usize);

impl TargetId {
    /// Identity of the object behind `target`.
    pub fn of<O: ?Sized>(target: &Rc<O>) -> Self {
        Self(Rc::as_ptr(target) as *const () as usize)
    }
}

/// The key half of an observed (object, key) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepKey {
    /// A named property or a map key.
    Prop(Cow<'static, str>),

    /// An integer index into an array-like object.
    Index(usize),

    /// The length of an array-like object.
    Length,

    /// Marker: the keys of this object were enumerated.
    Iterate,

    /// Marker: the keys of this map-like object were enumerated.
    MapKeyIterate,
}

impl DepKey {
    /// Whether this key is one of the two iteration markers.
    pub fn is_iteration_marker(&self) -> bool {
        matches!(self, DepKey::Iterate | DepKey::MapKeyIterate)
    }

    /// The index, when this is an integer index key.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            DepKey::Index(index) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(name) => f.write_str(name),
            DepKey::Index(index) => write!(f, "[{index}]"),
            DepKey::Length => f.write_str("length"),
            DepKey::Iterate => f.write_str("<iterate>"),
            DepKey::MapKeyIterate => f.write_str("<map-key-iterate>"),
        }
    }
}

impl From<&'static str> for DepKey {
    fn from(name: &'static str) -> Self {
        DepKey::Prop(Cow::Borrowed(name))
    }
}

impl From<String> for DepKey {
    fn from(name: String) -> Self {
        DepKey::Prop(Cow::Owned(name))
    }
}

impl From<usize> for DepKey {
    fn from(index: usize) -> Self {
        DepKey::Index(index)
    }
}

/// The set of effects subscribed to one (object, key) pair.
///
/// Duplicate-free; membership is keyed by [`EffectId`]. Subscribers are held
/// weakly: an effect lives as long as its handles, and a dropped effect is
/// pruned on the next insert or fan-out.
#[derive(Default)]
pub struct Dep {
    subscribers: RefCell<IndexMap<EffectId, Weak<dyn Reactive>>>,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribed effects.
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .values()
            .filter(|effect| effect.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the effect with `id` is subscribed.
    pub fn contains(&self, id: EffectId) -> bool {
        self.subscribers
            .borrow()
            .get(&id)
            .is_some_and(|effect| effect.strong_count() > 0)
    }

    /// Live subscribed effect ids, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<EffectId> {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(_, effect)| effect.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Add a subscriber. Returns false if it was already a member.
    pub(crate) fn insert(&self, effect: Rc<dyn Reactive>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, effect| effect.strong_count() > 0);

        let id = effect.id();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, Rc::downgrade(&effect));
        true
    }

    /// Remove a subscriber, keeping the order of the rest.
    pub(crate) fn remove(&self, id: EffectId) -> bool {
        self.subscribers.borrow_mut().shift_remove(&id).is_some()
    }

    /// Merge this set's live subscribers into `out`, first-seen.
    ///
    /// `running` is skipped unless it opted into recursive triggering.
    pub(crate) fn collect_into(
        &self,
        out: &mut IndexMap<EffectId, Rc<dyn Reactive>>,
        running: Option<EffectId>,
    ) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, effect| effect.strong_count() > 0);

        for (id, effect) in subscribers.iter() {
            if out.contains_key(id) {
                continue;
            }
            let Some(effect) = effect.upgrade() else {
                continue;
            };
            if Some(*id) == running && !effect.allow_recurse() {
                continue;
            }
            out.insert(*id, effect);
        }
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscriber_ids())
            .finish()
    }
}
