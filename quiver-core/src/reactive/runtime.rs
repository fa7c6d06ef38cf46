//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observed objects to
//! the effects that read them. It owns the [`TrackingContext`] and the
//! [`DepRegistry`] and implements the track/trigger protocol.
//!
//! # How It Works
//!
//! 1. Running an effect makes it the active effect of the tracking context.
//!
//! 2. Every observed read calls [`Runtime::track`], which subscribes the
//!    active effect to the (object, key) dependency set.
//!
//! 3. Every observed write calls [`Runtime::trigger`], which:
//!    a. Picks the dependency sets the mutation invalidates
//!    b. Merges their subscribers into one ordered, deduplicated list
//!    c. Hands each effect to its scheduler, or runs it synchronously
//!
//! # Threading
//!
//! A runtime is single-threaded: handles are `Rc`-based and `!Send`. Each
//! thread has a lazily created current runtime backing the free functions
//! in this module; code that wants isolation creates its own [`Runtime`]
//! and passes it around explicitly.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::context::TrackingContext;
use super::dep::{Dep, DepKey, TargetId};
use super::effect::{EffectOptions, ReactiveEffect};
use super::observed::Observed;
use super::operations::{DebuggerEvent, Mutation, TrackOp, TriggerOp};
use super::registry::DepRegistry;
use super::subscriber::{EffectId, Reactive};
use crate::config::RuntimeConfig;

thread_local! {
    static CURRENT: RefCell<Runtime> = RefCell::new(Runtime::new());
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    context: TrackingContext,
    registry: RefCell<DepRegistry>,
}

/// Handle to a reactivity runtime. Clones share the same state.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning handle to a [`Runtime`].
///
/// Effects and observed containers hold one of these so that they never keep
/// their runtime alive through a reference cycle.
#[derive(Clone, Default)]
pub struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRuntime")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let registry = DepRegistry::new(config.sweep_interval);
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: TrackingContext::new(),
                registry: RefCell::new(registry),
            }),
        }
    }

    /// This thread's current runtime.
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Make `runtime` this thread's current runtime, returning the previous one.
    pub fn set_current(runtime: Runtime) -> Runtime {
        CURRENT.with(|current| current.replace(runtime))
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn context(&self) -> &TrackingContext {
        &self.inner.context
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Effect lifecycle
    // ------------------------------------------------------------------------

    /// Wrap `computation` in an effect. Runs it once unless `options` is lazy.
    pub fn effect<T, F>(&self, computation: F, options: EffectOptions<T>) -> ReactiveEffect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        self.create_effect(Rc::new(computation), options)
    }

    /// Wrap the raw computation of an existing effect in a new effect.
    ///
    /// The new effect never wraps the old one; both call the same
    /// underlying computation.
    pub fn effect_from<T: 'static>(
        &self,
        effect: &ReactiveEffect<T>,
        options: EffectOptions<T>,
    ) -> ReactiveEffect<T> {
        self.create_effect(effect.raw(), options)
    }

    fn create_effect<T: 'static>(
        &self,
        raw: Rc<dyn Fn() -> T>,
        options: EffectOptions<T>,
    ) -> ReactiveEffect<T> {
        let lazy = options.lazy;
        let effect = ReactiveEffect::from_parts(raw, options, self.downgrade());
        debug!(effect = %effect.id(), lazy, "created effect");

        if !lazy {
            self.run_effect(&effect);
        }
        effect
    }

    /// Run `effect` as the active effect, rebuilding its dependencies.
    pub(crate) fn run_effect<T: 'static>(&self, effect: &ReactiveEffect<T>) -> Option<T> {
        let inner = &effect.inner;

        if !inner.active.get() {
            return match inner.options.scheduler {
                Some(_) => None,
                None => Some(self.untracked(|| (inner.raw)())),
            };
        }

        if self.inner.context.is_running(inner.id) {
            trace!(effect = %inner.id, "skipped recursive effect run");
            return None;
        }

        inner.cleanup();

        let raw = Rc::clone(&inner.raw);
        let subscriber: Rc<dyn Reactive> = effect.inner.clone();
        let _frame = self.inner.context.enter(subscriber);
        Some(raw())
    }

    /// Stop `effect`. Same as [`ReactiveEffect::stop`].
    pub fn stop<T: 'static>(&self, effect: &ReactiveEffect<T>) {
        effect.stop();
    }

    // ------------------------------------------------------------------------
    // Tracking controls
    // ------------------------------------------------------------------------

    pub fn pause_tracking(&self) {
        self.inner.context.pause_tracking();
    }

    pub fn enable_tracking(&self) {
        self.inner.context.enable_tracking();
    }

    pub fn reset_tracking(&self) {
        self.inner.context.reset_tracking();
    }

    /// Run `f` with tracking paused.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.inner.context.pause();
        f()
    }

    // ------------------------------------------------------------------------
    // Track / trigger
    // ------------------------------------------------------------------------

    /// Record that the active effect read `key` of `target`.
    pub fn track<O: Observed>(&self, target: &Rc<O>, op: TrackOp, key: impl Into<DepKey>) {
        self.track_in(
            TargetId::of(target),
            |registry, key| registry.get_or_create_dep(target, key),
            op,
            key.into(),
        );
    }

    /// [`track`](Self::track) for a type-erased target.
    pub fn track_dyn(&self, target: &Rc<dyn Observed>, op: TrackOp, key: impl Into<DepKey>) {
        self.track_in(
            TargetId::of(target),
            |registry, key| registry.get_or_create_dyn_dep(target, key),
            op,
            key.into(),
        );
    }

    fn track_in(
        &self,
        target_id: TargetId,
        dep_for: impl FnOnce(&mut DepRegistry, DepKey) -> Rc<Dep>,
        op: TrackOp,
        key: DepKey,
    ) {
        let context = &self.inner.context;
        if !context.should_track() {
            return;
        }
        let Some(effect) = context.active_effect() else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let dep = dep_for(&mut self.inner.registry.borrow_mut(), key.clone());

        if !dep.insert(Rc::clone(&effect)) {
            return;
        }
        effect.link(&dep);

        trace!(effect = %effect.id(), target = ?target_id, %key, ?op, "tracked dependency");

        if self.inner.config.debug_hooks && effect.observes_track() {
            effect.on_track(&DebuggerEvent::track(effect.id(), target_id, op, key));
        }
    }

    /// Re-run or schedule every effect invalidated by `mutation` on `target`.
    pub fn trigger<O: Observed + ?Sized>(&self, target: &Rc<O>, mutation: Mutation) {
        let effects = self.collect_effects(target, &mutation);
        if effects.is_empty() {
            return;
        }

        let target_id = TargetId::of(target);
        debug!(
            target = ?target_id,
            op = ?mutation.op,
            key = ?mutation.key,
            effects = effects.len(),
            "triggering effects"
        );

        for effect in effects.into_values() {
            // An earlier effect in this fan-out may have stopped it.
            if !effect.is_active() {
                continue;
            }
            if self.inner.config.debug_hooks && effect.observes_trigger() {
                effect.on_trigger(&DebuggerEvent::trigger(effect.id(), target_id, &mutation));
            }
            effect.schedule();
        }
    }

    /// Merge the subscribers of every dependency set `mutation` invalidates.
    fn collect_effects<O: Observed + ?Sized>(
        &self,
        target: &Rc<O>,
        mutation: &Mutation,
    ) -> IndexMap<EffectId, Rc<dyn Reactive>> {
        let mut effects = IndexMap::new();
        let registry = self.inner.registry.borrow();
        let Some(deps) = registry.deps_for(target) else {
            return effects;
        };

        let running = self.inner.context.active_effect_id();
        let kind = target.kind();
        let mut add = |key: &DepKey| {
            if let Some(dep) = deps.get(key) {
                dep.collect_into(&mut effects, running);
            }
        };

        if mutation.op == TriggerOp::Clear {
            for key in deps.keys() {
                add(key);
            }
        } else if kind.is_array() && mutation.key == Some(DepKey::Length) {
            let new_length = mutation.new_length();
            for key in deps.keys() {
                let out_of_range = matches!(
                    (key, new_length),
                    (DepKey::Index(index), Some(length)) if *index >= length
                );
                if *key == DepKey::Length || out_of_range {
                    add(key);
                }
            }
        } else {
            if let Some(key) = &mutation.key {
                add(key);
            }

            match mutation.op {
                TriggerOp::Add if !kind.is_array() => {
                    add(&DepKey::Iterate);
                    if kind.is_map() {
                        add(&DepKey::MapKeyIterate);
                    }
                }
                TriggerOp::Add => {
                    if matches!(mutation.key, Some(DepKey::Index(_))) {
                        add(&DepKey::Length);
                    }
                }
                TriggerOp::Delete if !kind.is_array() => {
                    add(&DepKey::Iterate);
                    if kind.is_map() {
                        add(&DepKey::MapKeyIterate);
                    }
                }
                TriggerOp::Set if kind.is_map() => {
                    add(&DepKey::Iterate);
                }
                _ => {}
            }
        }

        effects
    }

    // ------------------------------------------------------------------------
    // Registry maintenance
    // ------------------------------------------------------------------------

    /// Drop every dependency set of `target`. Returns whether it was tracked.
    pub fn forget<O: Observed + ?Sized>(&self, target: &Rc<O>) -> bool {
        self.inner.registry.borrow_mut().forget(target)
    }

    /// Purge registry entries whose object has been dropped.
    pub fn sweep(&self) -> usize {
        self.inner.registry.borrow_mut().sweep()
    }

    /// Number of live observed objects with dependency sets.
    pub fn tracked_targets(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Size of the dependency set for (target, key); `None` if never tracked.
    pub fn subscriber_count<O: Observed + ?Sized>(&self, target: &Rc<O>, key: &DepKey) -> Option<usize> {
        self.inner
            .registry
            .borrow()
            .dep(target, key)
            .map(|dep| dep.len())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("context", &self.inner.context)
            .field("registry", &*self.inner.registry.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Free functions on the current runtime
// ----------------------------------------------------------------------------

/// [`Runtime::effect`] on this thread's current runtime.
pub fn effect<T, F>(computation: F, options: EffectOptions<T>) -> ReactiveEffect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Runtime::current().effect(computation, options)
}

pub fn stop<T: 'static>(effect: &ReactiveEffect<T>) {
    effect.stop();
}

pub fn track<O: Observed>(target: &Rc<O>, op: TrackOp, key: impl Into<DepKey>) {
    Runtime::current().track(target, op, key);
}

pub fn track_dyn(target: &Rc<dyn Observed>, op: TrackOp, key: impl Into<DepKey>) {
    Runtime::current().track_dyn(target, op, key);
}

pub fn trigger<O: Observed + ?Sized>(target: &Rc<O>, mutation: Mutation) {
    Runtime::current().trigger(target, mutation);
}

pub fn pause_tracking() {
    Runtime::current().pause_tracking();
}

pub fn enable_tracking() {
    Runtime::current().enable_tracking();
}

pub fn reset_tracking() {
    Runtime::current().reset_tracking();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observed::TargetKind;
    use std::cell::Cell;

    struct Obj;
    impl Observed for Obj {}

    struct List;
    impl Observed for List {
        fn kind(&self) -> TargetKind {
            TargetKind::Array
        }
    }

    struct Dict;
    impl Observed for Dict {
        fn kind(&self) -> TargetKind {
            TargetKind::Map
        }
    }

    /// An effect that tracks `key` on `target` and counts its runs.
    fn reader<O: Observed>(
        runtime: &Runtime,
        target: &Rc<O>,
        op: TrackOp,
        key: DepKey,
    ) -> (ReactiveEffect, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let effect = runtime.effect(
            {
                let (runtime, target, runs) = (runtime.clone(), target.clone(), runs.clone());
                move || {
                    runs.set(runs.get() + 1);
                    runtime.track(&target, op, key.clone());
                }
            },
            EffectOptions::default(),
        );
        (effect, runs)
    }

    #[test]
    fn trigger_on_untracked_target_is_noop() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        runtime.trigger(&obj, Mutation::set("a"));
        assert_eq!(runtime.tracked_targets(), 0);
    }

    #[test]
    fn track_outside_an_effect_is_noop() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        runtime.track(&obj, TrackOp::Get, "a");
        assert_eq!(runtime.subscriber_count(&obj, &DepKey::from("a")), None);
    }

    #[test]
    fn set_reruns_readers_of_that_key_only() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let (_effect, runs) = reader(&runtime, &obj, TrackOp::Get, DepKey::from("a"));

        runtime.trigger(&obj, Mutation::set("a").with_new_value(2).with_old_value(1));
        assert_eq!(runs.get(), 2);

        runtime.trigger(&obj, Mutation::set("b").with_new_value(2).with_old_value(1));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn on_track_fires_once_per_new_edge() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let events = Rc::new(RefCell::new(Vec::new()));

        let _effect = runtime.effect(
            {
                let (runtime, obj) = (runtime.clone(), obj.clone());
                move || {
                    runtime.track(&obj, TrackOp::Get, "a");
                    runtime.track(&obj, TrackOp::Get, "a");
                    runtime.track(&obj, TrackOp::Has, "b");
                }
            },
            EffectOptions::new().on_track({
                let events = events.clone();
                move |event| events.borrow_mut().push(event.clone())
            }),
        );

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, Some(DepKey::from("a")));
        assert_eq!(events[1].op, crate::reactive::Operation::Track(TrackOp::Has));
        assert_eq!(events[1].target, TargetId::of(&obj));
    }

    #[test]
    fn on_trigger_receives_mutation_details() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let seen = Rc::new(RefCell::new(None));

        let effect = runtime.effect(
            {
                let (runtime, obj) = (runtime.clone(), obj.clone());
                move || runtime.track(&obj, TrackOp::Get, "a")
            },
            EffectOptions::new().on_trigger({
                let seen = seen.clone();
                move |event| *seen.borrow_mut() = Some(event.clone())
            }),
        );

        runtime.trigger(&obj, Mutation::set("a").with_new_value(2).with_old_value(1));

        let event = seen.borrow().clone().unwrap();
        assert_eq!(event.effect, effect.id());
        assert_eq!(event.op, crate::reactive::Operation::Trigger(TriggerOp::Set));
        assert_eq!(event.new_value, Some(serde_json::json!(2)));
        assert_eq!(event.old_value, Some(serde_json::json!(1)));
    }

    #[test]
    fn debug_hooks_can_be_disabled() {
        let runtime = Runtime::with_config(RuntimeConfig {
            debug_hooks: false,
            ..RuntimeConfig::default()
        });
        let obj = Rc::new(Obj);
        let hooks = Rc::new(Cell::new(0));

        let _effect = runtime.effect(
            {
                let (runtime, obj) = (runtime.clone(), obj.clone());
                move || runtime.track(&obj, TrackOp::Get, "a")
            },
            EffectOptions::new()
                .on_track({
                    let hooks = hooks.clone();
                    move |_| hooks.set(hooks.get() + 1)
                })
                .on_trigger({
                    let hooks = hooks.clone();
                    move |_| hooks.set(hooks.get() + 1)
                }),
        );
        runtime.trigger(&obj, Mutation::set("a"));

        assert_eq!(hooks.get(), 0);
    }

    #[test]
    fn add_to_plain_object_invalidates_iteration() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let (_iter, iter_runs) = reader(&runtime, &obj, TrackOp::Iterate, DepKey::Iterate);
        let (_keys, key_runs) = reader(&runtime, &obj, TrackOp::Iterate, DepKey::MapKeyIterate);

        runtime.trigger(&obj, Mutation::add("fresh"));
        assert_eq!(iter_runs.get(), 2);
        assert_eq!(key_runs.get(), 1);

        runtime.trigger(&obj, Mutation::delete("fresh"));
        assert_eq!(iter_runs.get(), 3);

        runtime.trigger(&obj, Mutation::set("fresh"));
        assert_eq!(iter_runs.get(), 3);
    }

    #[test]
    fn map_mutations_invalidate_both_markers() {
        let runtime = Runtime::new();
        let map = Rc::new(Dict);
        let (_iter, iter_runs) = reader(&runtime, &map, TrackOp::Iterate, DepKey::Iterate);
        let (_keys, key_runs) = reader(&runtime, &map, TrackOp::Iterate, DepKey::MapKeyIterate);

        runtime.trigger(&map, Mutation::add("k"));
        assert_eq!((iter_runs.get(), key_runs.get()), (2, 2));

        runtime.trigger(&map, Mutation::delete("k"));
        assert_eq!((iter_runs.get(), key_runs.get()), (3, 3));

        // Value replacement is visible to value iteration, not key iteration.
        runtime.trigger(&map, Mutation::set("k"));
        assert_eq!((iter_runs.get(), key_runs.get()), (4, 3));
    }

    #[test]
    fn array_add_at_index_invalidates_length() {
        let runtime = Runtime::new();
        let list = Rc::new(List);
        let (_len, len_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Length);
        let (_iter, iter_runs) = reader(&runtime, &list, TrackOp::Iterate, DepKey::Iterate);

        runtime.trigger(&list, Mutation::add(DepKey::Index(0)));
        assert_eq!(len_runs.get(), 2);
        assert_eq!(iter_runs.get(), 1);

        runtime.trigger(&list, Mutation::add("label"));
        assert_eq!(len_runs.get(), 2);

        runtime.trigger(&list, Mutation::delete(DepKey::Index(0)));
        assert_eq!(len_runs.get(), 2);
        assert_eq!(iter_runs.get(), 1);
    }

    #[test]
    fn length_shrink_invalidates_out_of_range_indices() {
        let runtime = Runtime::new();
        let list = Rc::new(List);
        let (_first, first_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Index(0));
        let (_third, third_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Index(2));
        let (_len, len_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Length);

        runtime.trigger(&list, Mutation::set(DepKey::Length).with_new_value(1).with_old_value(3));

        assert_eq!(first_runs.get(), 1);
        assert_eq!(third_runs.get(), 2);
        assert_eq!(len_runs.get(), 2);
    }

    #[test]
    fn length_without_new_value_only_hits_length() {
        let runtime = Runtime::new();
        let list = Rc::new(List);
        let (_third, third_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Index(2));
        let (_len, len_runs) = reader(&runtime, &list, TrackOp::Get, DepKey::Length);

        runtime.trigger(&list, Mutation::set(DepKey::Length));

        assert_eq!(third_runs.get(), 1);
        assert_eq!(len_runs.get(), 2);
    }

    #[test]
    fn clear_invalidates_every_key() {
        let runtime = Runtime::new();
        let map = Rc::new(Dict);
        let (_a, a_runs) = reader(&runtime, &map, TrackOp::Get, DepKey::from("a"));
        let (_iter, iter_runs) = reader(&runtime, &map, TrackOp::Iterate, DepKey::Iterate);

        runtime.trigger(&map, Mutation::clear());

        assert_eq!(a_runs.get(), 2);
        assert_eq!(iter_runs.get(), 2);
    }

    #[test]
    fn effect_in_several_matched_sets_runs_once() {
        let runtime = Runtime::new();
        let map = Rc::new(Dict);
        let runs = Rc::new(Cell::new(0));

        let _effect = runtime.effect(
            {
                let (runtime, map, runs) = (runtime.clone(), map.clone(), runs.clone());
                move || {
                    runs.set(runs.get() + 1);
                    runtime.track(&map, TrackOp::Get, "k");
                    runtime.track(&map, TrackOp::Iterate, DepKey::Iterate);
                    runtime.track(&map, TrackOp::Iterate, DepKey::MapKeyIterate);
                }
            },
            EffectOptions::default(),
        );

        runtime.trigger(&map, Mutation::add("k"));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn fan_out_follows_first_seen_order() {
        let runtime = Runtime::new();
        let map = Rc::new(Dict);
        let order = Rc::new(RefCell::new(Vec::new()));

        let spawn = |name: &'static str, keys: Vec<DepKey>| {
            runtime.effect(
                {
                    let (runtime, map, order) = (runtime.clone(), map.clone(), order.clone());
                    move || {
                        order.borrow_mut().push(name);
                        for key in &keys {
                            runtime.track(&map, TrackOp::Get, key.clone());
                        }
                    }
                },
                EffectOptions::default(),
            )
        };

        let _b = spawn("b", vec![DepKey::Iterate]);
        let _a = spawn("a", vec![DepKey::from("k")]);
        let _c = spawn("c", vec![DepKey::MapKeyIterate, DepKey::from("k")]);
        order.borrow_mut().clear();

        runtime.trigger(&map, Mutation::add("k"));

        assert_eq!(*order.borrow(), vec!["a", "c", "b"]);
    }

    #[test]
    fn dropping_a_runtime_handle_keeps_effects_working() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let (_effect, runs) = reader(&runtime, &obj, TrackOp::Get, DepKey::from("a"));

        let clone = runtime.clone();
        drop(clone);
        runtime.trigger(&obj, Mutation::set("a"));

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn forget_detaches_target_from_its_effects() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let (effect, runs) = reader(&runtime, &obj, TrackOp::Get, DepKey::from("a"));

        assert!(runtime.forget(&obj));
        runtime.trigger(&obj, Mutation::set("a"));

        assert_eq!(runs.get(), 1);
        assert!(effect.is_active());
    }

    #[test]
    fn current_runtime_is_per_thread_and_replaceable() {
        let replacement = Runtime::new();
        let previous = Runtime::set_current(replacement.clone());

        assert!(Runtime::current().ptr_eq(&replacement));
        Runtime::set_current(previous.clone());
        assert!(Runtime::current().ptr_eq(&previous));
    }

    #[test]
    fn effect_stopped_earlier_in_the_fan_out_is_skipped() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let victim_slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));

        let _stopper = runtime.effect(
            {
                let (runtime, obj, victim_slot) = (runtime.clone(), obj.clone(), victim_slot.clone());
                move || {
                    runtime.track(&obj, TrackOp::Get, "a");
                    if let Some(victim) = victim_slot.borrow().as_ref() {
                        victim.stop();
                    }
                }
            },
            EffectOptions::default(),
        );
        let (victim, victim_runs) = reader(&runtime, &obj, TrackOp::Get, DepKey::from("a"));
        *victim_slot.borrow_mut() = Some(victim.clone());

        runtime.trigger(&obj, Mutation::set("a"));

        assert!(!victim.is_active());
        assert_eq!(victim_runs.get(), 1);
    }

    #[test]
    fn effect_that_stops_itself_records_no_further_reads() {
        let runtime = Runtime::new();
        let obj = Rc::new(Obj);
        let self_slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));

        let effect = runtime.effect(
            {
                let (runtime, obj, self_slot) = (runtime.clone(), obj.clone(), self_slot.clone());
                move || {
                    if let Some(me) = self_slot.borrow().as_ref() {
                        me.stop();
                    }
                    runtime.track(&obj, TrackOp::Get, "a");
                }
            },
            EffectOptions::new().lazy(true),
        );
        *self_slot.borrow_mut() = Some(effect.clone());

        assert_eq!(effect.run(), Some(()));
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(runtime.subscriber_count(&obj, &DepKey::from("a")), None);
    }

    #[test]
    fn erased_targets_can_be_tracked_and_triggered() {
        let runtime = Runtime::new();
        let list: Rc<dyn Observed> = Rc::new(List);
        let runs = Rc::new(Cell::new(0));

        let _effect = runtime.effect(
            {
                let (runtime, list, runs) = (runtime.clone(), list.clone(), runs.clone());
                move || {
                    runs.set(runs.get() + 1);
                    runtime.track_dyn(&list, TrackOp::Get, DepKey::Index(2));
                }
            },
            EffectOptions::default(),
        );
        assert_eq!(runtime.subscriber_count(&list, &DepKey::Index(2)), Some(1));

        runtime.trigger(&list, Mutation::set(DepKey::Length).with_new_value(1));
        assert_eq!(runs.get(), 2);
    }
}
