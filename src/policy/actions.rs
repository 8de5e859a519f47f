//! Validation of the actions a state diff asks for.
//!
//! Some actions are too dangerous to run unattended (downgrades, namespace
//! switches). The validator checks every needed action against a deny-list
//! and reports all violations at once.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Action, DiffEntry, StateDiff};
use crate::error::{BlueprintError, Result};

/// Deny-lists for dogu and component actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffActionPolicy {
    /// Actions never allowed on dogus.
    #[serde(default = "default_denied_dogu_actions")]
    pub denied_dogu_actions: Vec<Action>,
    /// Actions never allowed on components.
    #[serde(default = "default_denied_component_actions")]
    pub denied_component_actions: Vec<Action>,
}

impl Default for DiffActionPolicy {
    fn default() -> Self {
        Self {
            denied_dogu_actions: default_denied_dogu_actions(),
            denied_component_actions: default_denied_component_actions(),
        }
    }
}

fn default_denied_dogu_actions() -> Vec<Action> {
    vec![Action::Downgrade, Action::SwitchDoguNamespace]
}

fn default_denied_component_actions() -> Vec<Action> {
    vec![Action::Downgrade, Action::SwitchComponentNamespace]
}

/// Checks state diffs against a [`DiffActionPolicy`].
#[derive(Debug, Clone, Default)]
pub struct DiffActionValidator {
    policy: DiffActionPolicy,
}

impl DiffActionValidator {
    /// Creates a validator for the given policy.
    #[must_use]
    pub const fn new(policy: DiffActionPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy this validator enforces.
    #[must_use]
    pub const fn policy(&self) -> &DiffActionPolicy {
        &self.policy
    }

    /// Validates every needed action of the dogu and component diffs.
    ///
    /// `allow_dogu_namespace_switch` lifts the ban on `switch-dogu-namespace`
    /// even if the policy lists it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlueprint` naming every offending action and the entry
    /// it was found in.
    pub fn validate(&self, diff: &StateDiff, allow_dogu_namespace_switch: bool) -> Result<()> {
        let mut violations = Vec::new();

        collect_violations(
            "dogu",
            &diff.dogu_diffs,
            &self.policy.denied_dogu_actions,
            allow_dogu_namespace_switch,
            &mut violations,
        );
        collect_violations(
            "component",
            &diff.component_diffs,
            &self.policy.denied_component_actions,
            false,
            &mut violations,
        );

        if violations.is_empty() {
            debug!("all diff actions are allowed");
            return Ok(());
        }

        Err(BlueprintError::invalid_blueprint(format!(
            "action validation failed: {}",
            violations.join("; ")
        )))
    }
}

fn collect_violations<S>(
    kind: &str,
    entries: &[DiffEntry<S, Action>],
    denied: &[Action],
    allow_dogu_namespace_switch: bool,
    violations: &mut Vec<String>,
) {
    for entry in entries {
        for action in &entry.needed_actions {
            if !denied.contains(action) {
                continue;
            }
            if *action == Action::SwitchDoguNamespace && allow_dogu_namespace_switch {
                continue;
            }
            violations.push(format!(
                "action \"{action}\" is not allowed for {kind} \"{}\"",
                entry.name
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentSnapshot, DoguSnapshot};
    use crate::error::ErrorKind;

    fn diff(dogus: &[(&str, &[Action])], components: &[(&str, &[Action])]) -> StateDiff {
        StateDiff {
            dogu_diffs: dogus
                .iter()
                .map(|(name, actions)| {
                    DiffEntry::new(*name, DoguSnapshot::default(), DoguSnapshot::default(), actions)
                })
                .collect(),
            component_diffs: components
                .iter()
                .map(|(name, actions)| {
                    DiffEntry::new(
                        *name,
                        ComponentSnapshot::default(),
                        ComponentSnapshot::default(),
                        actions,
                    )
                })
                .collect(),
            config_diffs: Vec::new(),
        }
    }

    #[test]
    fn test_allowed_actions_pass() {
        let validator = DiffActionValidator::default();
        let diff = diff(
            &[("official/cas", &[Action::Install, Action::UpdateDoguVolumeSize])],
            &[("k8s/k8s-longhorn", &[Action::Upgrade])],
        );
        assert!(validator.validate(&diff, false).is_ok());
    }

    #[test]
    fn test_all_violations_are_reported() {
        let validator = DiffActionValidator::default();
        let diff = diff(
            &[
                ("official/ldap", &[Action::Downgrade]),
                ("official/cas", &[Action::Upgrade]),
            ],
            &[("k8s/k8s-etcd", &[Action::SwitchComponentNamespace])],
        );

        let err = validator.validate(&diff, false).expect_err("should be rejected");

        assert_eq!(err.kind(), ErrorKind::InvalidBlueprint);
        let message = err.to_string();
        assert!(message.contains("\"downgrade\" is not allowed for dogu \"official/ldap\""));
        assert!(message.contains(
            "\"switch-component-namespace\" is not allowed for component \"k8s/k8s-etcd\""
        ));
        assert!(!message.contains("official/cas"));
    }

    #[test]
    fn test_namespace_switch_override() {
        let validator = DiffActionValidator::default();
        let diff = diff(&[("premium/scm", &[Action::SwitchDoguNamespace])], &[]);

        assert!(validator.validate(&diff, true).is_ok());
        assert!(validator.validate(&diff, false).is_err());
    }

    #[test]
    fn test_override_does_not_cover_other_actions() {
        let validator = DiffActionValidator::default();
        let diff = diff(
            &[("official/ldap", &[Action::SwitchDoguNamespace, Action::Downgrade])],
            &[],
        );

        let err = validator.validate(&diff, true).expect_err("downgrade stays denied");
        assert!(err.to_string().contains("downgrade"));
        assert!(!err.to_string().contains("switch-dogu-namespace"));
    }

    #[test]
    fn test_custom_policy() {
        let validator = DiffActionValidator::new(DiffActionPolicy {
            denied_dogu_actions: vec![Action::Uninstall],
            denied_component_actions: Vec::new(),
        });
        let diff = diff(
            &[("official/redmine", &[Action::Uninstall])],
            &[("k8s/k8s-etcd", &[Action::Downgrade])],
        );

        let err = validator.validate(&diff, false).expect_err("uninstall is denied");
        assert!(err.to_string().contains("uninstall"));
        assert!(!err.to_string().contains("k8s-etcd"));
    }
}
