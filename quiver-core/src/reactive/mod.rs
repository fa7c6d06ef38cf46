//! Reactive Core
//!
//! This module implements dependency tracking and change propagation: the
//! machinery that re-runs computations when the state they read changes.
//!
//! # Concepts
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] wraps a computation. While it runs, every observed
//! read is recorded as a dependency of the effect. When one of those
//! dependencies is written, the effect re-runs, or is handed to its
//! scheduler. Dependency sets hold effects weakly; an effect runs for as
//! long as something holds its handle.
//!
//! ## Track and Trigger
//!
//! Interception layers report reads with [`Runtime::track`] and writes with
//! [`Runtime::trigger`]. A read is identified by an observed object and a
//! [`DepKey`]; each (object, key) pair owns one [`Dep`] listing its
//! subscribers. Iteration is tracked against the synthetic
//! [`DepKey::Iterate`] and [`DepKey::MapKeyIterate`] keys so that adding or
//! removing keys invalidates loops over an object.
//!
//! ## Computed Values
//!
//! A [`Computed`] caches a derived value on top of a lazy effect with a
//! scheduler, recomputing only when read after an invalidation.
//!
//! # Implementation Notes
//!
//! The tracking context is an explicit object owned by the [`Runtime`]. The
//! free functions ([`effect`], [`track`], [`trigger`], ...) use a
//! thread-local current runtime for callers that do not pass one around.

mod computed;
mod context;
mod dep;
mod effect;
mod observed;
mod operations;
mod registry;
mod runtime;
mod subscriber;

pub use computed::Computed;
pub use context::{TrackingContext, TrackingPause};
pub use dep::{Dep, DepKey, TargetId};
pub use effect::{is_effect, DebugHook, EffectOptions, ReactiveEffect, Scheduler, StopHook};
pub use observed::{Observed, ObservedMap, ObservedVec, TargetKind};
pub use operations::{DebuggerEvent, Mutation, Operation, TrackOp, TriggerOp};
pub use registry::{DepRegistry, KeyDeps};
pub use runtime::{
    effect, enable_tracking, pause_tracking, reset_tracking, stop, track, track_dyn, trigger, Runtime,
    WeakRuntime,
};
pub use subscriber::EffectId;
