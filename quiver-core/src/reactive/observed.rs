//! Observed Objects
//!
//! Anything passed to `track`/`trigger` implements [`Observed`]. The trait
//! only answers one question the trigger fan-out needs: is this object
//! plain, array-like or map-like.
//!
//! This module also ships two reference containers that perform the
//! interception themselves: [`ObservedVec`] and [`ObservedMap`]. Every read
//! goes through `track` and every write through `trigger`, following the same
//! key conventions a proxy layer would.
//!
//! # Key Conventions
//!
//! | read                         | tracked key              |
//! |------------------------------|--------------------------|
//! | `vec.get(i)`                 | `Index(i)`               |
//! | `vec.len()`                  | `Length`                 |
//! | `vec.to_vec()`               | `Length` and every index |
//! | `map.get(k)`                 | `k` (`Get`)              |
//! | `map.contains_key(k)`        | `k` (`Has`)              |
//! | `map.len()`, `map.values()`  | `Iterate`                |
//! | `map.keys()`                 | `MapKeyIterate`          |

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::dep::DepKey;
use super::operations::{Mutation, TrackOp};
use super::runtime::{Runtime, WeakRuntime};

/// Shape of an observed object, as far as invalidation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A record with named properties.
    #[default]
    Plain,

    /// Indexed, with a length.
    Array,

    /// Keyed collection whose keys can be enumerated separately.
    Map,
}

impl TargetKind {
    pub fn is_array(self) -> bool {
        self == TargetKind::Array
    }

    pub fn is_map(self) -> bool {
        self == TargetKind::Map
    }
}

/// An object whose reads and writes are reported to a runtime.
pub trait Observed: 'static {
    fn kind(&self) -> TargetKind {
        TargetKind::Plain
    }
}

fn snapshot<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

// ----------------------------------------------------------------------------
// ObservedVec
// ----------------------------------------------------------------------------

struct VecTarget<T> {
    items: RefCell<Vec<T>>,
    runtime: WeakRuntime,
}

impl<T: 'static> Observed for VecTarget<T> {
    fn kind(&self) -> TargetKind {
        TargetKind::Array
    }
}

/// An array-like container that reports its reads and writes.
///
/// Clones share the same storage.
pub struct ObservedVec<T: 'static> {
    target: Rc<VecTarget<T>>,
}

impl<T> ObservedVec<T>
where
    T: Clone + PartialEq + Serialize + 'static,
{
    pub fn new(runtime: &Runtime) -> Self {
        Self::from_vec(runtime, Vec::new())
    }

    pub fn from_vec(runtime: &Runtime, items: Vec<T>) -> Self {
        Self {
            target: Rc::new(VecTarget {
                items: RefCell::new(items),
                runtime: runtime.downgrade(),
            }),
        }
    }

    fn track(&self, op: TrackOp, key: DepKey) {
        if let Some(runtime) = self.target.runtime.upgrade() {
            runtime.track(&self.target, op, key);
        }
    }

    fn trigger(&self, mutation: Mutation) {
        if let Some(runtime) = self.target.runtime.upgrade() {
            runtime.trigger(&self.target, mutation);
        }
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.track(TrackOp::Get, DepKey::Index(index));
        self.target.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.track(TrackOp::Get, DepKey::Length);
        self.target.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all items. Depends on the length and every index.
    pub fn to_vec(&self) -> Vec<T> {
        self.track(TrackOp::Iterate, DepKey::Length);
        let len = self.target.items.borrow().len();
        for index in 0..len {
            self.track(TrackOp::Get, DepKey::Index(index));
        }
        self.target.items.borrow().clone()
    }

    pub fn push(&self, value: T) {
        let new_value = snapshot(&value);
        let index = {
            let mut items = self.target.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        self.trigger(Mutation {
            new_value,
            ..Mutation::add(DepKey::Index(index))
        });
    }

    pub fn pop(&self) -> Option<T> {
        let (value, new_len) = {
            let mut items = self.target.items.borrow_mut();
            let value = items.pop()?;
            (value, items.len())
        };
        self.trigger(Mutation {
            old_value: snapshot(&value),
            ..Mutation::delete(DepKey::Index(new_len))
        });
        self.trigger(
            Mutation::set(DepKey::Length)
                .with_new_value(new_len)
                .with_old_value(new_len + 1),
        );
        Some(value)
    }

    /// Replace the item at `index`, returning the old one.
    ///
    /// Out-of-range indices leave the vector untouched and return `None`.
    /// Writing an equal value does not trigger.
    pub fn set(&self, index: usize, value: T) -> Option<T> {
        let (old, changed, new_value) = {
            let mut items = self.target.items.borrow_mut();
            let slot = items.get_mut(index)?;
            let changed = *slot != value;
            let new_value = if changed { snapshot(&value) } else { None };
            (std::mem::replace(slot, value), changed, new_value)
        };
        if changed {
            self.trigger(Mutation {
                new_value,
                old_value: snapshot(&old),
                ..Mutation::set(DepKey::Index(index))
            });
        }
        Some(old)
    }

    pub fn truncate(&self, len: usize) {
        let old_len = {
            let mut items = self.target.items.borrow_mut();
            let old_len = items.len();
            items.truncate(len);
            old_len
        };
        if len < old_len {
            self.trigger(
                Mutation::set(DepKey::Length)
                    .with_new_value(len)
                    .with_old_value(old_len),
            );
        }
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    /// Read without tracking.
    pub fn peek(&self) -> Vec<T> {
        self.target.items.borrow().clone()
    }
}

impl<T: 'static> Clone for ObservedVec<T> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ObservedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObservedVec")
            .field(&*self.target.items.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// ObservedMap
// ----------------------------------------------------------------------------

struct MapTarget<K, V> {
    entries: RefCell<IndexMap<K, V>>,
    runtime: WeakRuntime,
}

impl<K: 'static, V: 'static> Observed for MapTarget<K, V> {
    fn kind(&self) -> TargetKind {
        TargetKind::Map
    }
}

/// A map-like container that reports its reads and writes.
///
/// Iteration follows insertion order. Clones share the same storage.
pub struct ObservedMap<K: 'static, V: 'static> {
    target: Rc<MapTarget<K, V>>,
}

impl<K, V> ObservedMap<K, V>
where
    K: Clone + Eq + Hash + Into<DepKey> + Serialize + 'static,
    V: Clone + PartialEq + Serialize + 'static,
{
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            target: Rc::new(MapTarget {
                entries: RefCell::new(IndexMap::new()),
                runtime: runtime.downgrade(),
            }),
        }
    }

    fn track(&self, op: TrackOp, key: DepKey) {
        if let Some(runtime) = self.target.runtime.upgrade() {
            runtime.track(&self.target, op, key);
        }
    }

    fn trigger(&self, mutation: Mutation) {
        if let Some(runtime) = self.target.runtime.upgrade() {
            runtime.trigger(&self.target, mutation);
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.track(TrackOp::Get, key.clone().into());
        self.target.entries.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.track(TrackOp::Has, key.clone().into());
        self.target.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.track(TrackOp::Iterate, DepKey::Iterate);
        self.target.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.track(TrackOp::Iterate, DepKey::MapKeyIterate);
        self.target.entries.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.track(TrackOp::Iterate, DepKey::Iterate);
        self.target.entries.borrow().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        self.track(TrackOp::Iterate, DepKey::Iterate);
        self.target
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Insert or replace. Replacing with an equal value does not trigger.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let new_value = snapshot(&value);
        let old = self
            .target
            .entries
            .borrow_mut()
            .insert(key.clone(), value.clone());

        match &old {
            None => self.trigger(Mutation {
                new_value,
                ..Mutation::add(key)
            }),
            Some(previous) if *previous != value => self.trigger(Mutation {
                new_value,
                old_value: snapshot(previous),
                ..Mutation::set(key)
            }),
            Some(_) => {}
        }
        old
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let old = self.target.entries.borrow_mut().shift_remove(key)?;
        self.trigger(Mutation {
            old_value: snapshot(&old),
            ..Mutation::delete(key.clone())
        });
        Some(old)
    }

    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.target.entries.borrow_mut());
        if old.is_empty() {
            return;
        }
        let old_target = snapshot(&old.into_iter().collect::<Vec<_>>());
        self.trigger(Mutation {
            old_target,
            ..Mutation::clear()
        });
    }
}

impl<K: 'static, V: 'static> Clone for ObservedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
        }
    }
}

impl<K: fmt::Debug + 'static, V: fmt::Debug + 'static> fmt::Debug for ObservedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.target.entries.borrow().iter()).finish()
    }
}
