//! Tracking Context
//!
//! The tracking context records which effect is currently running and
//! whether reads should be tracked at all. It is what `track` consults to
//! decide which effect a read belongs to.
//!
//! # Implementation
//!
//! Running effects live on a stack. Running an effect pushes it and the
//! returned [`EffectFrame`] guard pops it again when dropped, so the stack is
//! restored even if the computation panics. The active effect is always the
//! top of the stack.
//!
//! Tracking can be switched off and on in nested regions. Every
//! `pause_tracking`/`enable_tracking` pushes the previous state and
//! `reset_tracking` pops it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::subscriber::{EffectId, Reactive};

/// Process-wide tracking state for one runtime.
pub struct TrackingContext {
    /// Effects currently running, innermost last.
    effect_stack: RefCell<Vec<Rc<dyn Reactive>>>,

    /// Whether reads are currently recorded.
    should_track: Cell<bool>,

    /// Saved `should_track` values, one per pause/enable.
    track_stack: RefCell<Vec<bool>>,
}

impl TrackingContext {
    /// A context with tracking enabled and no active effect.
    pub fn new() -> Self {
        Self {
            effect_stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
        }
    }

    /// Stop recording reads until the matching `reset_tracking`.
    pub fn pause_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    /// Record reads until the matching `reset_tracking`, even inside a paused region.
    pub fn enable_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    /// Restore the state saved by the last pause/enable.
    ///
    /// An unpaired call restores tracking to enabled.
    pub fn reset_tracking(&self) {
        let last = self.track_stack.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }

    /// Pause tracking until the returned guard is dropped.
    pub fn pause(&self) -> TrackingPause<'_> {
        self.pause_tracking();
        TrackingPause { context: self }
    }

    pub fn should_track(&self) -> bool {
        self.should_track.get()
    }

    /// Id of the innermost running effect.
    pub fn active_effect_id(&self) -> Option<EffectId> {
        self.effect_stack.borrow().last().map(|effect| effect.id())
    }

    /// Number of nested effect runs in progress.
    pub fn depth(&self) -> usize {
        self.effect_stack.borrow().len()
    }

    pub(crate) fn active_effect(&self) -> Option<Rc<dyn Reactive>> {
        self.effect_stack.borrow().last().cloned()
    }

    /// Whether the effect is anywhere on the stack.
    pub(crate) fn is_running(&self, id: EffectId) -> bool {
        self.effect_stack.borrow().iter().any(|effect| effect.id() == id)
    }

    /// Make `effect` the active effect with tracking enabled.
    ///
    /// Both are undone when the returned guard is dropped.
    pub(crate) fn enter(&self, effect: Rc<dyn Reactive>) -> EffectFrame<'_> {
        let id = effect.id();
        self.enable_tracking();
        self.effect_stack.borrow_mut().push(effect);
        EffectFrame { context: self, id }
    }
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingContext")
            .field("active_effect", &self.active_effect_id())
            .field("depth", &self.depth())
            .field("should_track", &self.should_track())
            .field("track_depth", &self.track_stack.borrow().len())
            .finish()
    }
}

/// Guard for one effect run. Pops the effect and restores tracking on drop.
pub(crate) struct EffectFrame<'a> {
    context: &'a TrackingContext,
    id: EffectId,
}

impl Drop for EffectFrame<'_> {
    fn drop(&mut self) {
        let popped = self.context.effect_stack.borrow_mut().pop();

        // Frames are strictly nested; a mismatch means a guard was leaked.
        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.id,
                "EffectFrame mismatch: expected {}, got {}",
                self.id,
                effect.id()
            );
        }

        self.context.reset_tracking();
    }
}

/// Guard returned by [`TrackingContext::pause`].
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingPause<'a> {
    context: &'a TrackingContext,
}

impl Drop for TrackingPause<'_> {
    fn drop(&mut self) {
        self.context.reset_tracking();
    }
}
