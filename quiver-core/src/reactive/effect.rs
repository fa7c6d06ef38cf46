//! Effect Implementation
//!
//! A [`ReactiveEffect`] wraps a computation so it re-runs whenever state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs once on creation to collect its
//!    first dependencies.
//!
//! 2. Every run first unsubscribes the effect from all dependency sets it
//!    joined last time, then collects a fresh set while the computation
//!    executes. Branches that are no longer taken stop being dependencies.
//!
//! 3. When a dependency is triggered, the effect is handed to its scheduler,
//!    or run synchronously when it has none.
//!
//! 4. Stopping an effect unsubscribes it for good.
//!
//! 5. Dependency sets only hold effects weakly. An effect lives as long as
//!    one of its handles does; dropping the last handle unsubscribes it.
//!
//! The record ([`EffectInner`]) only holds bookkeeping. Running it is the
//! runtime's job, see `Runtime::run_effect`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::dep::Dep;
use super::operations::DebuggerEvent;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::{EffectId, Reactive};

/// Receives a triggered effect instead of it running right away.
pub type Scheduler<T> = Rc<dyn Fn(&ReactiveEffect<T>)>;

/// Debug observation hook for `on_track` and `on_trigger`.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Called once when an effect is stopped.
pub type StopHook = Rc<dyn Fn()>;

/// Options recognised when creating an effect.
///
/// ```rust,ignore
/// let options = EffectOptions::new()
///     .lazy(true)
///     .scheduler(|effect| queue.push(effect.clone()));
/// ```
pub struct EffectOptions<T: 'static> {
    /// Defer the first run until `run` is called.
    pub(crate) lazy: bool,

    pub(crate) scheduler: Option<Scheduler<T>>,

    pub(crate) on_track: Option<DebugHook>,

    pub(crate) on_trigger: Option<DebugHook>,

    pub(crate) on_stop: Option<StopHook>,

    /// Let a trigger raised by the effect's own run schedule it again.
    pub(crate) allow_recurse: bool,
}

impl<T: 'static> EffectOptions<T> {
    pub fn new() -> Self {
        Self {
            lazy: false,
            scheduler: None,
            on_track: None,
            on_trigger: None,
            on_stop: None,
            allow_recurse: false,
        }
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&ReactiveEffect<T>) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_track<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DebuggerEvent) + 'static,
    {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DebuggerEvent) + 'static,
    {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_stop = Some(Rc::new(hook));
        self
    }

    pub fn allow_recurse(mut self, allow: bool) -> Self {
        self.allow_recurse = allow;
        self
    }
}

impl<T: 'static> Default for EffectOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for EffectOptions<T> {
    fn clone(&self) -> Self {
        Self {
            lazy: self.lazy,
            scheduler: self.scheduler.clone(),
            on_track: self.on_track.clone(),
            on_trigger: self.on_trigger.clone(),
            on_stop: self.on_stop.clone(),
            allow_recurse: self.allow_recurse,
        }
    }
}

impl<T: 'static> fmt::Debug for EffectOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .finish()
    }
}

/// Bookkeeping record behind a [`ReactiveEffect`].
pub(crate) struct EffectInner<T: 'static> {
    pub(crate) id: EffectId,

    /// The unwrapped computation.
    pub(crate) raw: Rc<dyn Fn() -> T>,

    /// Cleared by `stop`, never set again.
    pub(crate) active: Cell<bool>,

    /// Dependency sets this effect is subscribed to, in join order.
    ///
    /// Weak so an entry dropped from the registry is not kept alive by
    /// its subscribers.
    pub(crate) deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,

    pub(crate) options: EffectOptions<T>,

    pub(crate) runtime: WeakRuntime,
}

impl<T: 'static> EffectInner<T> {
    /// Leave every dependency set joined during the last run.
    pub(crate) fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
        if !deps.is_empty() {
            trace!(effect = %self.id, count = deps.len(), "cleared effect dependencies");
        }
    }

    pub(crate) fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = self.options.on_stop.clone() {
            on_stop();
        }
        self.active.set(false);
        debug!(effect = %self.id, "stopped effect");
    }
}

impl<T: 'static> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T: 'static> Reactive for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn allow_recurse(&self) -> bool {
        self.options.allow_recurse
    }

    fn link(&self, dep: &Rc<Dep>) {
        self.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    fn observes_track(&self) -> bool {
        self.options.on_track.is_some()
    }

    fn observes_trigger(&self) -> bool {
        self.options.on_trigger.is_some()
    }

    fn on_track(&self, event: &DebuggerEvent) {
        if let Some(hook) = self.options.on_track.clone() {
            hook(event);
        }
    }

    fn on_trigger(&self, event: &DebuggerEvent) {
        if let Some(hook) = self.options.on_trigger.clone() {
            hook(event);
        }
    }

    fn schedule(self: Rc<Self>) {
        let effect = ReactiveEffect { inner: self };
        match effect.inner.options.scheduler.clone() {
            Some(scheduler) => scheduler(&effect),
            None => {
                effect.run();
            }
        }
    }
}

/// A computation that re-runs when the state it read changes.
///
/// Cloning the handle shares the same effect. The effect stays subscribed
/// only while a handle is alive, so keep one for as long as it should run.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = Rc::new(State::default());
///
/// let _effect = runtime.effect(
///     {
///         let (runtime, state) = (runtime.clone(), state.clone());
///         move || {
///             runtime.track(&state, TrackOp::Get, "count");
///             println!("count is {}", state.count.get());
///         }
///     },
///     EffectOptions::default(),
/// );
///
/// state.count.set(5);
/// runtime.trigger(&state, Mutation::set("count"));  // prints "count is 5"
/// ```
pub struct ReactiveEffect<T: 'static = ()> {
    pub(crate) inner: Rc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    pub(crate) fn from_parts(raw: Rc<dyn Fn() -> T>, options: EffectOptions<T>, runtime: WeakRuntime) -> Self {
        Self {
            inner: Rc::new(EffectInner {
                id: EffectId::next(),
                raw,
                active: Cell::new(true),
                deps: RefCell::new(SmallVec::new()),
                options,
                runtime,
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// False once stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.options.allow_recurse
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    /// Number of dependency sets the effect joined during its last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// The unwrapped computation.
    pub fn raw(&self) -> Rc<dyn Fn() -> T> {
        Rc::clone(&self.inner.raw)
    }

    /// Run the effect, collecting fresh dependencies.
    ///
    /// Returns `None` when the effect is already running further up the
    /// stack, or when it is stopped and has a scheduler. A stopped effect
    /// without a scheduler runs its computation untracked.
    pub fn run(&self) -> Option<T> {
        match self.inner.runtime.upgrade() {
            Some(runtime) => runtime.run_effect(self),
            None if self.is_active() || self.inner.options.scheduler.is_none() => {
                Some((self.inner.raw)())
            }
            None => None,
        }
    }

    /// Unsubscribe the effect from everything. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The runtime this effect tracks into, if still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Whether `value` is a [`ReactiveEffect`] returning `T`.
pub fn is_effect<T: 'static>(value: &dyn Any) -> bool {
    value.is::<ReactiveEffect<T>>()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
