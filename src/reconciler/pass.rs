//! The reconcile pass.
//!
//! One pass loads the blueprint, re-evaluates its state diff, validates the
//! needed actions, applies them and persists every condition change right
//! after it happens. The first error stops the pass and is classified into a
//! scheduling decision.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ApplyAxis, BlueprintSpec};
use crate::error::{BlueprintError, ErrorKind, Result};
use crate::policy::{DiffActionValidator, RequeueClassifier, RequeueDecision};
use crate::state::BlueprintRepository;

use super::ports::{ApplyExecutor, DiffProvider};

/// Successful end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// The diff was evaluated; nothing was applied.
    DryRun,
    /// Nothing is left to apply and the blueprint is completed.
    Completed,
}

/// Result of [`Reconciler::reconcile`].
#[derive(Debug)]
pub struct PassReport {
    /// Blueprint the pass ran for.
    pub blueprint: String,
    /// How the pass ended, if it did not fail.
    pub outcome: Option<PassOutcome>,
    /// Error that stopped the pass, if any.
    pub error: Option<String>,
    /// What should happen next.
    pub decision: RequeueDecision,
}

/// Runs reconcile passes against the injected collaborators.
pub struct Reconciler {
    repository: Arc<dyn BlueprintRepository>,
    diff_provider: Arc<dyn DiffProvider>,
    executor: Arc<dyn ApplyExecutor>,
    validator: DiffActionValidator,
    classifier: RequeueClassifier,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backend", &self.repository.backend_type())
            .field("validator", &self.validator)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler with default policies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BlueprintRepository>,
        diff_provider: Arc<dyn DiffProvider>,
        executor: Arc<dyn ApplyExecutor>,
    ) -> Self {
        Self {
            repository,
            diff_provider,
            executor,
            validator: DiffActionValidator::default(),
            classifier: RequeueClassifier::default(),
        }
    }

    /// Sets the diff action validator.
    #[must_use]
    pub fn with_validator(mut self, validator: DiffActionValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Sets the requeue classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: RequeueClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the repository passes persist to.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn BlueprintRepository> {
        &self.repository
    }

    /// Runs one pass and classifies its result.
    pub async fn reconcile(&self, id: &str) -> PassReport {
        match self.run_pass(id).await {
            Ok(outcome) => {
                info!(blueprint = %id, ?outcome, "reconcile pass finished");
                PassReport {
                    blueprint: id.to_string(),
                    outcome: Some(outcome),
                    error: None,
                    decision: RequeueDecision::NoFurtherAction,
                }
            }
            Err(err) => {
                let error = Some(err.to_string());
                PassReport {
                    blueprint: id.to_string(),
                    outcome: None,
                    error,
                    decision: self.classifier.decide(id, err),
                }
            }
        }
    }

    /// Runs one pass.
    ///
    /// # Errors
    ///
    /// Returns the first error of the pass. `StateDiffNotEmpty` means changes
    /// were applied and the diff has to be checked again.
    #[instrument(skip(self), fields(backend = self.repository.backend_type()))]
    pub async fn run_pass(&self, id: &str) -> Result<PassOutcome> {
        self.ensure_single_blueprint().await?;

        let mut spec = self.repository.get(id).await?;
        debug!("loaded blueprint");

        self.determine_state_diff(&mut spec).await?;
        self.validate_actions(&mut spec).await?;

        spec.evaluate_state_diff(ApplyAxis::Dogus, None);
        spec.evaluate_state_diff(ApplyAxis::Components, None);

        if spec.config.dry_run {
            self.repository.update(&mut spec).await?;
            info!("dry run, state diff evaluated without applying");
            return Ok(PassOutcome::DryRun);
        }

        self.check_health(&mut spec).await?;

        let had_changes = spec.state_diff.has_changes();

        let result = self
            .executor
            .apply_components(&spec.state_diff.component_diffs)
            .await;
        self.complete_apply(&mut spec, ApplyAxis::Components, result).await?;

        let result = self.executor.apply_dogus(&spec.state_diff.dogu_diffs).await;
        self.complete_apply(&mut spec, ApplyAxis::Dogus, result).await?;

        self.apply_config(&mut spec).await?;

        if had_changes {
            self.repository.update(&mut spec).await?;
            return Err(BlueprintError::StateDiffNotEmpty {
                message: String::from("changes were applied, state diff must be determined again"),
            });
        }

        spec.complete();
        self.repository.update(&mut spec).await?;
        Ok(PassOutcome::Completed)
    }

    async fn ensure_single_blueprint(&self) -> Result<()> {
        let ids = self.repository.list().await?;
        if ids.len() > 1 {
            return Err(BlueprintError::MultipleBlueprints { ids });
        }
        Ok(())
    }

    async fn determine_state_diff(&self, spec: &mut BlueprintSpec) -> Result<()> {
        match self.diff_provider.determine_state_diff(spec).await {
            Ok(diff) => {
                spec.state_diff = diff;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "cannot determine state diff");
                spec.evaluate_state_diff(ApplyAxis::Dogus, Some(&err));
                spec.evaluate_state_diff(ApplyAxis::Components, Some(&err));
                self.repository.update(spec).await?;
                Err(err)
            }
        }
    }

    async fn validate_actions(&self, spec: &mut BlueprintSpec) -> Result<()> {
        let allow_switch = spec.config.allow_dogu_namespace_switch;
        if let Err(err) = self.validator.validate(&spec.state_diff, allow_switch) {
            spec.reject_actions(&err);
            self.repository.update(spec).await?;
            return Err(err);
        }
        Ok(())
    }

    async fn check_health(&self, spec: &mut BlueprintSpec) -> Result<()> {
        if let Err(err) = self.executor.check_ecosystem_health(&spec.config).await {
            if err.kind() == ErrorKind::Unhealthy {
                spec.reject_unhealthy_ecosystem(&err);
                self.repository.update(spec).await?;
            }
            return Err(err);
        }
        Ok(())
    }

    async fn complete_apply(
        &self,
        spec: &mut BlueprintSpec,
        axis: ApplyAxis,
        result: Result<()>,
    ) -> Result<()> {
        let changed = spec.complete_apply(axis, result.as_ref().copied());
        if changed || !spec.events().is_empty() {
            self.repository.update(spec).await?;
        }
        result
    }

    async fn apply_config(&self, spec: &mut BlueprintSpec) -> Result<()> {
        if !spec.state_diff.config_has_changes() {
            spec.mark_config_applied();
            return Ok(());
        }

        spec.start_apply_config();
        self.repository.update(spec).await?;

        match self.executor.apply_config(&spec.state_diff.config_diffs).await {
            Ok(()) => {
                spec.mark_config_applied();
                self.repository.update(spec).await?;
                Ok(())
            }
            Err(err) => {
                spec.mark_config_apply_failed(&err);
                self.repository.update(spec).await?;
                Err(err)
            }
        }
    }
}
