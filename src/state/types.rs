//! Persisted representation of a blueprint.
//!
//! The record is what the file adapter writes to disk. It carries the spec
//! flags, the status written by the lifecycle engine and a capped history of
//! published events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{BlueprintConfig, BlueprintEvent, BlueprintSpec, Conditions, StateDiff};

/// Current version of the record format.
pub const FORMAT_VERSION: &str = "1.0";

/// Number of published events kept per blueprint.
pub const MAX_HISTORY: usize = 100;

/// A persisted blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintRecord {
    /// Record format version.
    pub format_version: String,
    /// Blueprint identifier.
    pub id: String,
    /// Desired-state flags.
    pub spec: RecordSpec,
    /// Status written by the lifecycle engine.
    pub status: RecordStatus,
    /// Published events, oldest first.
    #[serde(default)]
    pub events: Vec<RecordedEvent>,
    /// When the record was last written.
    pub last_updated: DateTime<Utc>,
}

/// Persisted spec section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Policy flags.
    #[serde(default)]
    pub config: BlueprintConfig,
}

/// Persisted status section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordStatus {
    /// Convergence conditions.
    #[serde(default)]
    pub conditions: Conditions,
    /// Latest state diff.
    #[serde(default)]
    pub state_diff: StateDiff,
}

/// A published event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Event name.
    pub name: String,
    /// Event message.
    pub message: String,
}

impl RecordedEvent {
    /// Records a domain event at the given time.
    #[must_use]
    pub fn from_event(event: &BlueprintEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            name: event.name().to_string(),
            message: event.message(),
        }
    }
}

impl BlueprintRecord {
    /// Builds a record from the aggregate, without event history.
    #[must_use]
    pub fn from_spec(spec: &BlueprintSpec) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            id: spec.id.clone(),
            spec: RecordSpec {
                config: spec.config.clone(),
            },
            status: RecordStatus {
                conditions: spec.conditions.clone(),
                state_diff: spec.state_diff.clone(),
            },
            events: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Rebuilds the aggregate from this record.
    ///
    /// The returned aggregate has no pending events and no resource version;
    /// the repository sets the version after loading.
    #[must_use]
    pub fn to_spec(&self) -> BlueprintSpec {
        let mut spec = BlueprintSpec::new(self.id.clone(), self.spec.config.clone());
        spec.conditions = self.status.conditions.clone();
        spec.state_diff = self.status.state_diff.clone();
        spec
    }

    /// Appends published events and trims the history to [`MAX_HISTORY`].
    pub fn append_events(&mut self, events: &[BlueprintEvent], timestamp: DateTime<Utc>) {
        self.events
            .extend(events.iter().map(|e| RecordedEvent::from_event(e, timestamp)));
        if self.events.len() > MAX_HISTORY {
            let excess = self.events.len() - MAX_HISTORY;
            self.events.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConditionStatus, ConditionType};

    #[test]
    fn test_record_round_trips_status() {
        let mut spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        spec.conditions.set(
            ConditionType::Completed,
            ConditionStatus::True,
            "Completed",
            "done",
            Utc::now(),
        );

        let restored = BlueprintRecord::from_spec(&spec).to_spec();

        assert_eq!(restored.id, "blueprint-1");
        assert!(restored.conditions.is_true(ConditionType::Completed));
        assert!(restored.events().is_empty());
        assert!(!restored.is_persisted());
    }

    #[test]
    fn test_history_is_capped() {
        let spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        let mut record = BlueprintRecord::from_spec(&spec);
        let events = vec![BlueprintEvent::Completed; MAX_HISTORY + 5];

        record.append_events(&events, Utc::now());
        record.append_events(&[BlueprintEvent::ConfigApplied], Utc::now());

        assert_eq!(record.events.len(), MAX_HISTORY);
        assert_eq!(
            record.events.last().map(|e| e.name.as_str()),
            Some("EcosystemConfigApplied")
        );
    }
}
