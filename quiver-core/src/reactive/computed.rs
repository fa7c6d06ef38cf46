//! Computed Values
//!
//! A [`Computed`] is a cached derived value that re-evaluates only when the
//! state it read changes, and only when someone reads it again.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect whose scheduler does not run
//!    it. Instead, a trigger marks the value dirty and triggers the
//!    computed's own `value` key.
//!
//! 2. `get()` recomputes if dirty, caches the result, and tracks `value`, so
//!    effects reading a computed re-run when it is invalidated.
//!
//! Values that are never read stay dirty and cost nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::dep::DepKey;
use super::effect::{EffectOptions, ReactiveEffect};
use super::observed::Observed;
use super::operations::{Mutation, TrackOp};
use super::runtime::{Runtime, WeakRuntime};

const VALUE_KEY: &str = "value";

struct ComputedInner<T: 'static> {
    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    /// Set by the effect's scheduler, cleared by a recompute.
    dirty: Cell<bool>,

    effect: ReactiveEffect<T>,

    runtime: WeakRuntime,
}

impl<T: 'static> Observed for ComputedInner<T> {}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let items = ObservedVec::from_vec(&runtime, vec![1, 2, 3]);
/// let total = Computed::new(&runtime, {
///     let items = items.clone();
///     move || items.to_vec().iter().sum::<i32>()
/// });
///
/// assert_eq!(total.get(), 6);
/// items.push(4);
/// assert_eq!(total.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. The getter does not run until the first `get`.
    pub fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let effect = runtime.effect(
                getter,
                EffectOptions::new().lazy(true).scheduler(move |_| {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if inner.dirty.replace(true) {
                        return;
                    }
                    if let Some(runtime) = inner.runtime.upgrade() {
                        runtime.trigger(&inner, Mutation::set(VALUE_KEY));
                    }
                }),
            );

            ComputedInner {
                value: RefCell::new(None),
                dirty: Cell::new(true),
                effect,
                runtime: runtime.downgrade(),
            }
        });

        Self { inner }
    }

    /// The current value, recomputed first if a dependency changed.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this value during its own first
    /// evaluation, when there is nothing cached to return yet. Use
    /// [`try_get`](Self::try_get) in getters that may read themselves.
    pub fn get(&self) -> T {
        self.try_get()
            .expect("computed value read itself during its first evaluation")
    }

    /// Like [`get`](Self::get), but `None` instead of a panic when a
    /// self-referencing getter has not produced a value yet.
    pub fn try_get(&self) -> Option<T> {
        if self.inner.dirty.get() {
            self.recompute();
        }

        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(&self.inner, TrackOp::Get, DepKey::from(VALUE_KEY));
        }

        self.inner.value.borrow().clone()
    }

    fn recompute(&self) {
        let effect = &self.inner.effect;
        let value = if effect.is_active() {
            // `run` yields nothing when the getter is already on the stack.
            effect.run()
        } else {
            let raw = effect.raw();
            Some(match self.inner.runtime.upgrade() {
                Some(runtime) => runtime.untracked(&*raw),
                None => raw(),
            })
        };

        if let Some(value) = value {
            *self.inner.value.borrow_mut() = Some(value);
            self.inner.dirty.set(false);
        }
    }

    /// Whether the next `get` will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Stop following dependencies. The cached value is kept; a value that
    /// was never computed is computed on demand, untracked.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }

    /// The effect that evaluates the getter.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.inner.effect
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ObservedVec;

    #[test]
    fn computed_is_lazy_and_cached() {
        let runtime = Runtime::new();
        let evaluations = Rc::new(Cell::new(0));
        let evaluations_clone = evaluations.clone();

        let computed = Computed::new(&runtime, move || {
            evaluations_clone.set(evaluations_clone.get() + 1);
            42
        });

        assert_eq!(evaluations.get(), 0);
        assert!(computed.is_dirty());

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(evaluations.get(), 1);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn computed_recomputes_after_invalidation() {
        let runtime = Runtime::new();
        let items = ObservedVec::from_vec(&runtime, vec![1, 2, 3]);
        let total = Computed::new(&runtime, {
            let items = items.clone();
            move || items.to_vec().iter().sum::<i32>()
        });

        assert_eq!(total.get(), 6);

        items.push(4);
        assert!(total.is_dirty());
        assert_eq!(total.get(), 10);
    }

    #[test]
    fn effects_depend_on_computed_values() {
        let runtime = Runtime::new();
        let items = ObservedVec::from_vec(&runtime, vec![2]);
        let doubled = Computed::new(&runtime, {
            let items = items.clone();
            move || items.get(0).unwrap_or_default() * 2
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _effect = runtime.effect(
            {
                let (doubled, seen) = (doubled.clone(), seen.clone());
                move || seen.borrow_mut().push(doubled.get())
            },
            EffectOptions::default(),
        );

        items.set(0, 5);
        items.set(0, 7);

        assert_eq!(*seen.borrow(), vec![4, 10, 14]);
    }

    #[test]
    fn chained_computed_values() {
        let runtime = Runtime::new();
        let items = ObservedVec::from_vec(&runtime, vec![5]);
        let doubled = Computed::new(&runtime, {
            let items = items.clone();
            move || items.get(0).unwrap_or_default() * 2
        });
        let plus_ten = Computed::new(&runtime, {
            let doubled = doubled.clone();
            move || doubled.get() + 10
        });

        assert_eq!(plus_ten.get(), 20);
        items.set(0, 10);
        assert_eq!(plus_ten.get(), 30);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn stopped_computed_keeps_its_value() {
        let runtime = Runtime::new();
        let items = ObservedVec::from_vec(&runtime, vec![1]);
        let first = Computed::new(&runtime, {
            let items = items.clone();
            move || items.get(0).unwrap_or_default()
        });

        assert_eq!(first.get(), 1);
        first.stop();
        items.set(0, 9);

        assert!(!first.is_dirty());
        assert_eq!(first.get(), 1);
    }

    #[test]
    fn self_reading_getter_sees_no_value_yet() {
        let runtime = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let computed = Computed::new(&runtime, {
            let slot = slot.clone();
            move || {
                let previous = slot.borrow().as_ref().and_then(|me| me.try_get());
                previous.unwrap_or(0) + 1
            }
        });
        *slot.borrow_mut() = Some(computed.clone());

        assert_eq!(computed.get(), 1);
        assert_eq!(computed.get(), 1);
    }

    #[test]
    #[should_panic(expected = "computed value read itself")]
    fn self_reading_get_panics_instead_of_recursing() {
        let runtime = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let computed = Computed::new(&runtime, {
            let slot = slot.clone();
            move || slot.borrow().as_ref().map_or(0, |me| me.get()) + 1
        });
        *slot.borrow_mut() = Some(computed.clone());

        computed.get();
    }

    #[test]
    fn dropping_a_computed_releases_its_sources() {
        let runtime = Runtime::new();
        {
            let items = ObservedVec::from_vec(&runtime, vec![1, 2]);
            let total = Computed::new(&runtime, {
                let items = items.clone();
                move || items.to_vec().iter().sum::<i32>()
            });
            assert_eq!(total.get(), 3);
            assert_eq!(runtime.tracked_targets(), 1);
        }

        assert_eq!(runtime.tracked_targets(), 0);
        assert_eq!(runtime.sweep(), 1);
    }

    #[test]
    fn computed_stopped_before_first_read_still_evaluates() {
        let runtime = Runtime::new();
        let items = ObservedVec::from_vec(&runtime, vec![4]);
        let first = Computed::new(&runtime, {
            let items = items.clone();
            move || items.get(0).unwrap_or_default()
        });

        first.stop();
        assert_eq!(first.try_get(), Some(4));

        items.set(0, 9);
        assert!(!first.is_dirty());
        assert_eq!(first.get(), 4);
    }
}
