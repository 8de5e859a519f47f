//! Condition records reporting convergence progress.
//!
//! A condition is one observable axis of progress (dogus applied, components
//! applied, ...). A [`Conditions`] set holds at most one condition per type and
//! performs change detection when a condition is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason tokens used by the lifecycle engine.
pub mod reason {
    /// Changes are pending and must be applied.
    pub const NEED_TO_APPLY: &str = "NeedToApply";
    /// The axis is applied.
    pub const APPLIED: &str = "Applied";
    /// Applying failed; sticky until the next explicit apply attempt.
    pub const CANNOT_APPLY: &str = "CannotApply";
    /// The state diff could not be computed.
    pub const CANNOT_DETERMINE_STATE_DIFF: &str = "CannotDetermineStateDiff";
    /// Ecosystem config is being applied.
    pub const APPLYING: &str = "Applying";
    /// Applying the ecosystem config failed.
    pub const APPLYING_FAILED: &str = "ApplyingFailed";
    /// The blueprint is completely applied.
    pub const COMPLETED: &str = "Completed";
}

/// Axis a condition reports on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// Dogus match the blueprint.
    DogusApplied,
    /// Components match the blueprint.
    ComponentsApplied,
    /// Ecosystem config matches the blueprint.
    ConfigApplied,
    /// The whole blueprint has been applied.
    Completed,
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The engine cannot tell.
    Unknown,
}

/// A single condition record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Axis this condition reports on.
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Current status.
    pub status: ConditionStatus,
    /// Machine-readable reason token.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// When status or reason last changed.
    pub last_transition_time: DateTime<Utc>,
}

/// Ordered set of conditions, at most one per [`ConditionType`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    /// Creates an empty condition set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.condition_type == condition_type)
    }

    /// Returns true if the given condition is present with status `True`.
    #[must_use]
    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        self.get(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Writes a condition and reports whether it changed.
    ///
    /// A write counts as a change when the condition was absent or its status
    /// or reason differ. Only then is `last_transition_time` moved to `now`.
    /// The message is always stored.
    pub fn set(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let message = message.into();

        if let Some(existing) = self.0.iter_mut().find(|c| c.condition_type == condition_type) {
            let changed = existing.status != status || existing.reason != reason;
            if changed {
                existing.status = status;
                existing.reason = reason.to_string();
                existing.last_transition_time = now;
            }
            existing.message = message;
            return changed;
        }

        self.0.push(Condition {
            condition_type,
            status,
            reason: reason.to_string(),
            message,
            last_transition_time: now,
        });
        true
    }

    /// Iterates over all conditions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    /// Returns the number of conditions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no condition has been written yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DogusApplied => "DogusApplied",
            Self::ComponentsApplied => "ComponentsApplied",
            Self::ConfigApplied => "ConfigApplied",
            Self::Completed => "Completed",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_set_inserts_absent_condition() {
        let mut conditions = Conditions::new();
        let now = Utc::now();

        let changed = conditions.set(
            ConditionType::DogusApplied,
            ConditionStatus::False,
            reason::NEED_TO_APPLY,
            "pending",
            now,
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        let condition = conditions.get(ConditionType::DogusApplied);
        assert!(condition.is_some_and(|c| c.last_transition_time == now));
    }

    #[test]
    fn test_message_only_change_is_not_a_transition() {
        let mut conditions = Conditions::new();
        let first = Utc::now();
        let later = first + Duration::seconds(30);

        conditions.set(
            ConditionType::ConfigApplied,
            ConditionStatus::False,
            reason::APPLYING,
            "first",
            first,
        );
        let changed = conditions.set(
            ConditionType::ConfigApplied,
            ConditionStatus::False,
            reason::APPLYING,
            "second",
            later,
        );

        assert!(!changed);
        let condition = conditions
            .get(ConditionType::ConfigApplied)
            .expect("condition should exist");
        assert_eq!(condition.message, "second");
        assert_eq!(condition.last_transition_time, first);
    }

    #[test]
    fn test_reason_change_moves_transition_time() {
        let mut conditions = Conditions::new();
        let first = Utc::now();
        let later = first + Duration::seconds(5);

        conditions.set(
            ConditionType::DogusApplied,
            ConditionStatus::False,
            reason::NEED_TO_APPLY,
            "",
            first,
        );
        let changed = conditions.set(
            ConditionType::DogusApplied,
            ConditionStatus::False,
            reason::APPLIED,
            "",
            later,
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        let condition = conditions
            .get(ConditionType::DogusApplied)
            .expect("condition should exist");
        assert_eq!(condition.last_transition_time, later);
    }
}
