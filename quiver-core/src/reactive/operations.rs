//! Track and trigger vocabulary.
//!
//! Interception layers describe every observed read with a [`TrackOp`] and
//! every observed write with a [`Mutation`]. Debug hooks receive both as a
//! [`DebuggerEvent`].

use serde::Serialize;
use serde_json::Value;

use super::dep::{DepKey, TargetId};
use super::subscriber::EffectId;

/// Kind of observed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of observed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOp {
    /// An existing key got a new value.
    Set,
    /// A key that did not exist was added.
    Add,
    Delete,
    /// The container was emptied.
    Clear,
}

/// Either side of the protocol, as reported to debug hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Operation {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// One observed write, as passed to `trigger`.
///
/// The value payloads are optional and only matter in two places: debug
/// hooks see them, and a `Length` write on an array-like object reads
/// `new_value` as the new length.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub op: TriggerOp,
    pub key: Option<DepKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Snapshot of the container before the write (clears).
    pub old_target: Option<Value>,
}

impl Mutation {
    pub fn new(op: TriggerOp, key: Option<DepKey>) -> Self {
        Self {
            op,
            key,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub fn set(key: impl Into<DepKey>) -> Self {
        Self::new(TriggerOp::Set, Some(key.into()))
    }

    pub fn add(key: impl Into<DepKey>) -> Self {
        Self::new(TriggerOp::Add, Some(key.into()))
    }

    pub fn delete(key: impl Into<DepKey>) -> Self {
        Self::new(TriggerOp::Delete, Some(key.into()))
    }

    pub fn clear() -> Self {
        Self::new(TriggerOp::Clear, None)
    }

    pub fn with_new_value(mut self, value: impl Into<Value>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    pub fn with_old_value(mut self, value: impl Into<Value>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn with_old_target(mut self, snapshot: impl Into<Value>) -> Self {
        self.old_target = Some(snapshot.into());
        self
    }

    /// `new_value` read as an array length.
    pub(crate) fn new_length(&self) -> Option<usize> {
        self.new_value
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|len| usize::try_from(len).ok())
    }
}

/// Payload handed to `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: TargetId,
    #[serde(rename = "type")]
    pub op: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<DepKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_target: Option<Value>,
}

impl DebuggerEvent {
    pub(crate) fn track(effect: EffectId, target: TargetId, op: TrackOp, key: DepKey) -> Self {
        Self {
            effect,
            target,
            op: Operation::Track(op),
            key: Some(key),
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub(crate) fn trigger(effect: EffectId, target: TargetId, mutation: &Mutation) -> Self {
        Self {
            effect,
            target,
            op: Operation::Trigger(mutation.op),
            key: mutation.key.clone(),
            new_value: mutation.new_value.clone(),
            old_value: mutation.old_value.clone(),
            old_target: mutation.old_target.clone(),
        }
    }
}
