//! Dependency Registry
//!
//! Maps observed objects to their per-key dependency sets:
//!
//! ```text
//! TargetId -> { target: Weak<dyn Observed>, deps: DepKey -> Rc<Dep> }
//! ```
//!
//! # Ownership
//!
//! The registry never keeps an observed object alive. Each entry holds a weak
//! reference next to the address-derived [`TargetId`]. An entry whose object
//! is gone is treated as absent, replaced if the address is reused, and
//! purged by [`DepRegistry::sweep`]. Sweeps run automatically every
//! `sweep_interval` new entries, or explicitly. Dependency sets hold their
//! effects weakly, so an effect capturing its target does not pin the entry
//! once the effect's handles are gone.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use super::dep::{Dep, DepKey, TargetId};
use super::observed::Observed;

/// Dependency sets of one observed object, in first-tracked key order.
pub type KeyDeps = IndexMap<DepKey, Rc<Dep>>;

struct TargetEntry {
    target: Weak<dyn Observed>,
    deps: KeyDeps,
}

impl TargetEntry {
    fn new(target: Weak<dyn Observed>) -> Self {
        Self {
            target,
            deps: IndexMap::new(),
        }
    }

    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// Object -> key -> dependency set.
pub struct DepRegistry {
    targets: HashMap<TargetId, TargetEntry>,

    /// New entries between automatic sweeps; 0 disables them.
    sweep_interval: usize,

    inserted_since_sweep: usize,
}

impl DepRegistry {
    pub fn new(sweep_interval: usize) -> Self {
        Self {
            targets: HashMap::new(),
            sweep_interval,
            inserted_since_sweep: 0,
        }
    }

    /// The dependency set for (target, key), created on first use.
    pub fn get_or_create_dep<O: Observed>(&mut self, target: &Rc<O>, key: DepKey) -> Rc<Dep> {
        self.dep_entry(
            TargetId::of(target),
            || -> Weak<dyn Observed> {
                let weak: Weak<O> = Rc::downgrade(target);
                weak
            },
            key,
        )
    }

    /// [`get_or_create_dep`](Self::get_or_create_dep) for a type-erased target.
    pub fn get_or_create_dyn_dep(&mut self, target: &Rc<dyn Observed>, key: DepKey) -> Rc<Dep> {
        self.dep_entry(TargetId::of(target), || Rc::downgrade(target), key)
    }

    fn dep_entry(
        &mut self,
        id: TargetId,
        downgrade: impl FnOnce() -> Weak<dyn Observed>,
        key: DepKey,
    ) -> Rc<Dep> {
        if self.targets.get(&id).is_some_and(|entry| !entry.is_alive()) {
            // The address was reused by a new object.
            self.targets.remove(&id);
        }

        if !self.targets.contains_key(&id) {
            self.inserted_since_sweep += 1;
            if self.sweep_interval > 0 && self.inserted_since_sweep >= self.sweep_interval {
                self.sweep();
            }
        }

        let entry = self
            .targets
            .entry(id)
            .or_insert_with(|| TargetEntry::new(downgrade()));

        Rc::clone(entry.deps.entry(key).or_insert_with(|| Rc::new(Dep::new())))
    }

    /// All dependency sets of `target`, or `None` if it was never tracked.
    pub fn deps_for<O: Observed + ?Sized>(&self, target: &Rc<O>) -> Option<&KeyDeps> {
        self.targets
            .get(&TargetId::of(target))
            .filter(|entry| entry.is_alive())
            .map(|entry| &entry.deps)
    }

    /// The dependency set for (target, key), if it exists.
    pub fn dep<O: Observed + ?Sized>(&self, target: &Rc<O>, key: &DepKey) -> Option<&Rc<Dep>> {
        self.deps_for(target).and_then(|deps| deps.get(key))
    }

    /// Drop the entry for `target`. Returns whether one existed.
    pub fn forget<O: Observed + ?Sized>(&mut self, target: &Rc<O>) -> bool {
        self.targets.remove(&TargetId::of(target)).is_some()
    }

    /// Purge entries whose object has been dropped. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, entry| entry.is_alive());
        self.inserted_since_sweep = 0;

        let removed = before - self.targets.len();
        if removed > 0 {
            debug!(removed, remaining = self.targets.len(), "swept dead dependency targets");
        }
        removed
    }

    /// Number of entries whose object is still alive.
    pub fn len(&self) -> usize {
        self.targets.values().filter(|entry| entry.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DepRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SWEEP_INTERVAL)
    }
}

impl std::fmt::Debug for DepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepRegistry")
            .field("targets", &self.targets.len())
            .field("live", &self.len())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
