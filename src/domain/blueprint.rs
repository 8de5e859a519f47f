//! The `BlueprintSpec` aggregate.
//!
//! The aggregate is the unit a reconcile pass operates on. The lifecycle engine
//! writes its conditions and pending events, the diff collaborator writes its
//! state diff, and the persistence collaborator owns the resource version.

use serde::{Deserialize, Serialize};

use crate::error::{BlueprintError, Result};

use super::condition::Conditions;
use super::diff::StateDiff;
use super::event::BlueprintEvent;

/// Policy flags of a blueprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintConfig {
    /// Permit moving dogus between namespaces.
    #[serde(default)]
    pub allow_dogu_namespace_switch: bool,
    /// Only determine the state diff, never apply it.
    #[serde(default)]
    pub dry_run: bool,
    /// Skip the dogu health precondition.
    #[serde(default)]
    pub ignore_dogu_health: bool,
    /// Skip the component health precondition.
    #[serde(default)]
    pub ignore_component_health: bool,
}

/// Optimistic-concurrency token of a persisted blueprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ResourceVersion(String);

/// The blueprint aggregate.
#[derive(Debug, Clone)]
pub struct BlueprintSpec {
    /// Unique blueprint identifier.
    pub id: String,
    /// Policy flags.
    pub config: BlueprintConfig,
    /// Convergence conditions.
    pub conditions: Conditions,
    /// Latest state diff.
    pub state_diff: StateDiff,
    /// Events not yet published.
    events: Vec<BlueprintEvent>,
    /// Version the aggregate was loaded at, if it was loaded from storage.
    resource_version: Option<ResourceVersion>,
}

impl ResourceVersion {
    /// Wraps a version token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the version token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BlueprintSpec {
    /// Creates a fresh aggregate without conditions or persistence context.
    #[must_use]
    pub fn new(id: impl Into<String>, config: BlueprintConfig) -> Self {
        Self {
            id: id.into(),
            config,
            conditions: Conditions::new(),
            state_diff: StateDiff::default(),
            events: Vec::new(),
            resource_version: None,
        }
    }

    /// Returns the events not yet published.
    #[must_use]
    pub fn events(&self) -> &[BlueprintEvent] {
        &self.events
    }

    /// Appends a pending event.
    pub(crate) fn record_event(&mut self, event: BlueprintEvent) {
        self.events.push(event);
    }

    /// Removes and returns all pending events.
    ///
    /// Must only be called after the events have been durably published.
    pub fn drain_events(&mut self) -> Vec<BlueprintEvent> {
        std::mem::take(&mut self.events)
    }

    /// Returns the resource version this aggregate was loaded at.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the aggregate carries no persistence
    /// context, i.e. it was never loaded from or written to storage.
    pub fn resource_version(&self) -> Result<&ResourceVersion> {
        self.resource_version.as_ref().ok_or_else(|| {
            BlueprintError::internal(format!(
                "blueprint '{}' has no resource version; it was not loaded from storage",
                self.id
            ))
        })
    }

    /// Returns true if the aggregate was loaded from storage.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.resource_version.is_some()
    }

    /// Sets the resource version after a load or a successful write.
    pub fn set_resource_version(&mut self, version: ResourceVersion) {
        self.resource_version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_resource_version_missing_is_internal_error() {
        let spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        let err = spec.resource_version().expect_err("should fail without context");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("blueprint-1"));
    }

    #[test]
    fn test_drain_events_empties_queue_once() {
        let mut spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        spec.record_event(BlueprintEvent::Completed);

        let drained = spec.drain_events();
        assert_eq!(drained, vec![BlueprintEvent::Completed]);
        assert!(spec.events().is_empty());
        assert!(spec.drain_events().is_empty());
    }
}
