//! Immutable policies applied during a reconcile pass.
//!
//! This module contains:
//! - The diff action validator and its deny-lists
//! - The requeue classifier and its delays

mod actions;
mod requeue;

pub use actions::{DiffActionPolicy, DiffActionValidator};
pub use requeue::{
    DEFAULT_MISSING_RESOURCE_MARKERS, RequeueClassifier, RequeueDecision, RequeuePolicy,
};
