//! Quiver Core
//!
//! This crate provides the dependency-tracking core of the Quiver reactivity
//! engine. It implements:
//!
//! - Reactive effects with lazy evaluation, custom schedulers and debug hooks
//! - The track/trigger protocol used by interception layers
//! - A weakly keyed registry of dependency sets
//! - Computed values and reference observed containers
//!
//! Rendering, template compilation and batching policies are built on top of
//! this crate, not inside it.
//!
//! # Architecture
//!
//! - `reactive`: effects, tracking context, registry, track/trigger
//! - `config`: runtime configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,ignore
//! use quiver_core::reactive::{Computed, EffectOptions, ObservedVec, Runtime};
//!
//! let runtime = Runtime::new();
//! let items = ObservedVec::from_vec(&runtime, vec![1, 2, 3]);
//!
//! let total = Computed::new(&runtime, {
//!     let items = items.clone();
//!     move || items.to_vec().iter().sum::<i32>()
//! });
//!
//! let _log = runtime.effect(
//!     {
//!         let total = total.clone();
//!         move || println!("total: {}", total.get())
//!     },
//!     EffectOptions::default(),
//! );
//!
//! items.push(4);
//! // Effect automatically runs, prints: "total: 10"
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::ConfigError;
pub use reactive::{
    effect, enable_tracking, pause_tracking, reset_tracking, stop, track, track_dyn, trigger, Computed,
    DepKey, EffectOptions, Mutation, Observed, ReactiveEffect, Runtime, TargetKind, TrackOp,
    TriggerOp,
};
