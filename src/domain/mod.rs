//! Blueprint domain model.
//!
//! This module contains:
//! - The `BlueprintSpec` aggregate and its policy flags
//! - Conditions with change detection
//! - The state diff model
//! - Domain events
//! - The condition state machine

mod blueprint;
mod condition;
mod diff;
mod event;
mod lifecycle;

pub use blueprint::{BlueprintConfig, BlueprintSpec, ResourceVersion};
pub use condition::{reason, Condition, ConditionStatus, ConditionType, Conditions};
pub use diff::{
    count_actions, has_changes, Action, ComponentDiff, ComponentSnapshot, ConfigAction,
    ConfigDiff, ConfigSnapshot, DiffEntry, DoguDiff, DoguSnapshot, StateDiff,
};
pub use event::{ApplyAxis, BlueprintEvent};
