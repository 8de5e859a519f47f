//! Domain events emitted on condition transitions.
//!
//! Events are appended to the aggregate by the lifecycle engine and published
//! by the persistence collaborator once the new status is durably stored.

use serde::{Deserialize, Serialize};

use super::condition::ConditionType;
use super::diff::{count_actions, StateDiff};

/// Axis driven by the apply/diff duality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAxis {
    /// Dogu installation axis.
    Dogus,
    /// Component installation axis.
    Components,
}

/// A domain event describing an observed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlueprintEvent {
    /// The state diff of an axis was determined.
    StateDiffDetermined {
        /// Axis the diff belongs to.
        axis: ApplyAxis,
        /// Number of needed actions per action token.
        actions: Vec<(String, usize)>,
    },
    /// The state diff of an axis could not be determined.
    StateDiffFailed {
        /// Axis the diff belongs to.
        axis: ApplyAxis,
        /// Error text.
        error: String,
    },
    /// The diff contains actions the policy does not permit.
    ActionsNotAllowed {
        /// Aggregated policy violations.
        error: String,
    },
    /// The ecosystem did not pass the health precondition.
    EcosystemUnhealthy {
        /// Health problem description.
        error: String,
    },
    /// Applying an axis failed.
    ApplyFailed {
        /// Axis that failed.
        axis: ApplyAxis,
        /// Error text.
        error: String,
    },
    /// An axis was applied.
    Applied {
        /// Axis that was applied.
        axis: ApplyAxis,
    },
    /// Applying the ecosystem config started.
    ConfigApplying,
    /// Applying the ecosystem config failed.
    ConfigApplyFailed {
        /// Error text.
        error: String,
    },
    /// The ecosystem config was applied.
    ConfigApplied,
    /// The blueprint was completely applied.
    Completed,
}

impl ApplyAxis {
    /// Returns the condition type this axis reports through.
    #[must_use]
    pub const fn condition_type(self) -> ConditionType {
        match self {
            Self::Dogus => ConditionType::DogusApplied,
            Self::Components => ConditionType::ComponentsApplied,
        }
    }

    /// Returns true if the diff of this axis needs actions.
    #[must_use]
    pub fn has_changes(self, diff: &StateDiff) -> bool {
        match self {
            Self::Dogus => diff.dogus_have_changes(),
            Self::Components => diff.components_have_changes(),
        }
    }

    /// Counts needed actions of this axis per action token.
    #[must_use]
    pub fn action_counts(self, diff: &StateDiff) -> Vec<(String, usize)> {
        let counts = match self {
            Self::Dogus => count_actions(&diff.dogu_diffs),
            Self::Components => count_actions(&diff.component_diffs),
        };
        counts
            .into_iter()
            .map(|(action, count)| (action.to_string(), count))
            .collect()
    }

    const fn singular(self) -> &'static str {
        match self {
            Self::Dogus => "dogu",
            Self::Components => "component",
        }
    }
}

impl BlueprintEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateDiffDetermined { axis: ApplyAxis::Dogus, .. } => "StateDiffDoguDetermined",
            Self::StateDiffDetermined { axis: ApplyAxis::Components, .. } => {
                "StateDiffComponentDetermined"
            }
            Self::StateDiffFailed { axis: ApplyAxis::Dogus, .. } => "StateDiffDoguFailed",
            Self::StateDiffFailed { axis: ApplyAxis::Components, .. } => {
                "StateDiffComponentFailed"
            }
            Self::ActionsNotAllowed { .. } => "BlueprintSpecInvalid",
            Self::EcosystemUnhealthy { .. } => "EcosystemUnhealthy",
            Self::ApplyFailed { axis: ApplyAxis::Dogus, .. } => "DogusApplyFailed",
            Self::ApplyFailed { axis: ApplyAxis::Components, .. } => "ComponentsApplyFailed",
            Self::Applied { axis: ApplyAxis::Dogus } => "DogusApplied",
            Self::Applied { axis: ApplyAxis::Components } => "ComponentsApplied",
            Self::ConfigApplying => "ApplyEcosystemConfig",
            Self::ConfigApplyFailed { .. } => "ApplyEcosystemConfigFailed",
            Self::ConfigApplied => "EcosystemConfigApplied",
            Self::Completed => "BlueprintApplied",
        }
    }

    /// Renders the human-readable event message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::StateDiffDetermined { axis, actions } => {
                let total: usize = actions.iter().map(|(_, count)| count).sum();
                if total == 0 {
                    format!("{} state diff determined: no changes", axis.singular())
                } else {
                    let details: Vec<String> = actions
                        .iter()
                        .map(|(action, count)| format!("\"{action}\": {count}"))
                        .collect();
                    format!(
                        "{} state diff determined: {total} actions ({})",
                        axis.singular(),
                        details.join(", ")
                    )
                }
            }
            Self::StateDiffFailed { axis, error } => {
                format!("cannot determine {} state diff: {error}", axis.singular())
            }
            Self::ActionsNotAllowed { error } => {
                format!("blueprint spec contains actions that are not allowed: {error}")
            }
            Self::EcosystemUnhealthy { error } => format!("ecosystem is unhealthy: {error}"),
            Self::ApplyFailed { axis, error } => format!("cannot apply {axis}: {error}"),
            Self::Applied { axis } => format!("{axis} applied"),
            Self::ConfigApplying => String::from("apply ecosystem config"),
            Self::ConfigApplyFailed { error } => {
                format!("ecosystem config could not be applied: {error}")
            }
            Self::ConfigApplied => String::from("ecosystem config applied"),
            Self::Completed => String::from("blueprint was successfully applied"),
        }
    }
}

impl std::fmt::Display for ApplyAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Dogus => "dogus",
            Self::Components => "components",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for BlueprintEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_diff_message_lists_action_counts() {
        let event = BlueprintEvent::StateDiffDetermined {
            axis: ApplyAxis::Dogus,
            actions: vec![(String::from("install"), 2), (String::from("upgrade"), 1)],
        };
        assert_eq!(event.name(), "StateDiffDoguDetermined");
        assert_eq!(
            event.message(),
            "dogu state diff determined: 3 actions (\"install\": 2, \"upgrade\": 1)"
        );
    }

    #[test]
    fn test_state_diff_message_without_changes() {
        let event = BlueprintEvent::StateDiffDetermined {
            axis: ApplyAxis::Components,
            actions: vec![],
        };
        assert_eq!(event.message(), "component state diff determined: no changes");
    }

    #[test]
    fn test_apply_failed_message() {
        let event = BlueprintEvent::ApplyFailed {
            axis: ApplyAxis::Components,
            error: String::from("timeout"),
        };
        assert_eq!(event.name(), "ComponentsApplyFailed");
        assert_eq!(event.to_string(), "ComponentsApplyFailed: cannot apply components: timeout");
    }
}
