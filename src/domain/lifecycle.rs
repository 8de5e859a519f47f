//! Condition state machine of the blueprint lifecycle.
//!
//! Every function here is a synchronous transition on the aggregate. It writes
//! at most one condition, appends at most one event and returns whether the
//! condition changed. The caller decides when to persist.

use chrono::Utc;
use tracing::{debug, error};

use crate::error::BlueprintError;

use super::blueprint::BlueprintSpec;
use super::condition::{reason, ConditionStatus, ConditionType};
use super::event::{ApplyAxis, BlueprintEvent};

impl BlueprintSpec {
    /// Re-evaluates an apply axis against the current state diff.
    ///
    /// `diff_error` is the error the diff collaborator reported, if the diff
    /// could not be computed. It takes priority over every other rule and
    /// forces the axis to `Unknown`.
    ///
    /// A `CannotApply` axis is left alone: only [`Self::complete_apply`] moves
    /// it again.
    pub fn evaluate_state_diff(
        &mut self,
        axis: ApplyAxis,
        diff_error: Option<&BlueprintError>,
    ) -> bool {
        let condition_type = axis.condition_type();

        if let Some(err) = diff_error {
            let message = err.to_string();
            let changed = self.conditions.set(
                condition_type,
                ConditionStatus::Unknown,
                reason::CANNOT_DETERMINE_STATE_DIFF,
                message.clone(),
                Utc::now(),
            );
            if changed {
                self.record_event(BlueprintEvent::StateDiffFailed {
                    axis,
                    error: message,
                });
            }
            return changed;
        }

        let has_changes = axis.has_changes(&self.state_diff);
        let current = self
            .conditions
            .get(condition_type)
            .map(|c| (c.status, c.reason.clone()));

        let target = match &current {
            None => Some(has_changes),
            Some((ConditionStatus::Unknown, _)) => Some(has_changes),
            Some((_, r)) if r == reason::NEED_TO_APPLY => Some(has_changes),
            Some((_, r)) if r == reason::CANNOT_APPLY => {
                debug!(blueprint = %self.id, %axis, "axis cannot be applied, keeping condition");
                None
            }
            Some((_, r)) if r == reason::APPLIED => has_changes.then_some(true),
            Some((status, r)) => {
                error!(
                    blueprint = %self.id,
                    %axis,
                    %status,
                    reason = %r,
                    "unexpected condition while evaluating state diff"
                );
                debug_assert!(false, "unexpected {condition_type} condition {status}/{r}");
                None
            }
        };

        let Some(needs_apply) = target else {
            return false;
        };

        let (reason, message) = if needs_apply {
            (reason::NEED_TO_APPLY, format!("{axis} need to be applied"))
        } else {
            (reason::APPLIED, format!("{axis} are already applied"))
        };

        let changed = self.conditions.set(
            condition_type,
            ConditionStatus::False,
            reason,
            message,
            Utc::now(),
        );
        if changed {
            let actions = axis.action_counts(&self.state_diff);
            self.record_event(BlueprintEvent::StateDiffDetermined { axis, actions });
        }
        changed
    }

    /// Records the outcome of an apply attempt on an axis.
    ///
    /// A failure always emits an event. A success emits one only when the
    /// axis had pending changes.
    pub fn complete_apply(
        &mut self,
        axis: ApplyAxis,
        outcome: Result<(), &BlueprintError>,
    ) -> bool {
        let condition_type = axis.condition_type();
        let now = Utc::now();

        match outcome {
            Err(err) => {
                let message = err.to_string();
                let changed = self.conditions.set(
                    condition_type,
                    ConditionStatus::False,
                    reason::CANNOT_APPLY,
                    message.clone(),
                    now,
                );
                self.record_event(BlueprintEvent::ApplyFailed {
                    axis,
                    error: message,
                });
                changed
            }
            Ok(()) => {
                let changed = self.conditions.set(
                    condition_type,
                    ConditionStatus::True,
                    reason::APPLIED,
                    format!("{axis} applied"),
                    now,
                );
                if axis.has_changes(&self.state_diff) {
                    self.record_event(BlueprintEvent::Applied { axis });
                }
                changed
            }
        }
    }

    /// Marks the ecosystem config as being applied.
    pub fn start_apply_config(&mut self) -> bool {
        self.set_config_condition(
            ConditionStatus::False,
            reason::APPLYING,
            String::from("apply ecosystem config"),
            BlueprintEvent::ConfigApplying,
        )
    }

    /// Marks applying the ecosystem config as failed.
    pub fn mark_config_apply_failed(&mut self, err: &BlueprintError) -> bool {
        let message = err.to_string();
        self.set_config_condition(
            ConditionStatus::False,
            reason::APPLYING_FAILED,
            message.clone(),
            BlueprintEvent::ConfigApplyFailed { error: message },
        )
    }

    /// Marks the ecosystem config as applied.
    pub fn mark_config_applied(&mut self) -> bool {
        self.set_config_condition(
            ConditionStatus::True,
            reason::APPLIED,
            String::from("ecosystem config applied"),
            BlueprintEvent::ConfigApplied,
        )
    }

    /// Latches the blueprint as completed.
    pub fn complete(&mut self) -> bool {
        let changed = self.conditions.set(
            ConditionType::Completed,
            ConditionStatus::True,
            reason::COMPLETED,
            "blueprint was successfully applied",
            Utc::now(),
        );
        if changed {
            self.record_event(BlueprintEvent::Completed);
        }
        changed
    }

    /// Records that the state diff asks for actions the policy denies.
    ///
    /// No condition changes; the blueprint stays where it is until a new
    /// version of it arrives.
    pub fn reject_actions(&mut self, err: &BlueprintError) {
        self.record_event(BlueprintEvent::ActionsNotAllowed {
            error: err.to_string(),
        });
    }

    /// Records that the ecosystem failed the health precondition.
    pub fn reject_unhealthy_ecosystem(&mut self, err: &BlueprintError) {
        self.record_event(BlueprintEvent::EcosystemUnhealthy {
            error: err.to_string(),
        });
    }

    /// Returns true if the completed latch is set.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.conditions.is_true(ConditionType::Completed)
    }

    fn set_config_condition(
        &mut self,
        status: ConditionStatus,
        reason: &str,
        message: String,
        event: BlueprintEvent,
    ) -> bool {
        let changed = self.conditions.set(
            ConditionType::ConfigApplied,
            status,
            reason,
            message,
            Utc::now(),
        );
        if changed {
            self.record_event(event);
        }
        changed
    }
}
