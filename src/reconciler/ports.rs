//! Collaborators a reconcile pass talks to.
//!
//! The lifecycle engine does not compute diffs or touch the ecosystem itself.
//! It asks a [`DiffProvider`] for the state diff and hands the diff to an
//! [`ApplyExecutor`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{BlueprintConfig, BlueprintSpec, ComponentDiff, ConfigDiff, DoguDiff, StateDiff};
use crate::error::{BlueprintError, Result};

/// Computes the state diff of a blueprint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiffProvider: Send + Sync {
    /// Determines the difference between the blueprint and the ecosystem.
    async fn determine_state_diff(&self, spec: &BlueprintSpec) -> Result<StateDiff>;
}

/// Applies state diffs to the ecosystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplyExecutor: Send + Sync {
    /// Checks that the ecosystem is healthy enough to apply changes.
    ///
    /// Implementations honour the ignore flags of the config.
    async fn check_ecosystem_health(&self, config: &BlueprintConfig) -> Result<()>;

    /// Applies component diffs.
    async fn apply_components(&self, diffs: &[ComponentDiff]) -> Result<()>;

    /// Applies dogu diffs.
    async fn apply_dogus(&self, diffs: &[DoguDiff]) -> Result<()>;

    /// Applies config diffs.
    async fn apply_config(&self, diffs: &[ConfigDiff]) -> Result<()>;
}

/// Diff provider serving diffs registered up front.
#[derive(Debug, Default)]
pub struct StaticDiffProvider {
    diffs: RwLock<HashMap<String, StateDiff>>,
}

impl StaticDiffProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the diff served for a blueprint.
    pub fn set(&self, id: impl Into<String>, diff: StateDiff) {
        self.diffs.write().insert(id.into(), diff);
    }
}

#[async_trait]
impl DiffProvider for StaticDiffProvider {
    async fn determine_state_diff(&self, spec: &BlueprintSpec) -> Result<StateDiff> {
        let diff = self.diffs.read().get(&spec.id).cloned();
        diff.ok_or_else(|| BlueprintError::NotFound {
            resource: spec.id.clone(),
            message: String::from("no state diff registered for blueprint"),
            retryable: true,
        })
    }
}

/// Executor that never touches the ecosystem.
///
/// Health checks pass; any apply request is an error, because a dry-run pass
/// must stop before applying.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    fn refuse(what: &str, count: usize) -> Result<()> {
        Err(BlueprintError::internal(format!(
            "dry-run executor cannot apply {count} {what} diffs"
        )))
    }
}

#[async_trait]
impl ApplyExecutor for DryRunExecutor {
    async fn check_ecosystem_health(&self, config: &BlueprintConfig) -> Result<()> {
        debug!(
            ignore_dogu_health = config.ignore_dogu_health,
            ignore_component_health = config.ignore_component_health,
            "dry-run executor reports a healthy ecosystem"
        );
        Ok(())
    }

    async fn apply_components(&self, diffs: &[ComponentDiff]) -> Result<()> {
        Self::refuse("component", diffs.len())
    }

    async fn apply_dogus(&self, diffs: &[DoguDiff]) -> Result<()> {
        Self::refuse("dogu", diffs.len())
    }

    async fn apply_config(&self, diffs: &[ConfigDiff]) -> Result<()> {
        info!(count = diffs.len(), "dry-run executor refuses config diffs");
        Self::refuse("config", diffs.len())
    }
}
