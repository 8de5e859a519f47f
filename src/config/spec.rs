//! Operator configuration types.
//!
//! This module defines the structs that map to `blueprint-operator.yaml`.
//! Every section is optional and falls back to the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::policy::{DiffActionPolicy, RequeuePolicy, DEFAULT_MISSING_RESOURCE_MARKERS};
use crate::scheduling::ErrorBackoff;

/// The root operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace of the ecosystem the operator manages.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Persistence configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Debounce configuration.
    #[serde(default)]
    pub debounce: DebounceConfig,
    /// Requeue delays and backoff bounds.
    #[serde(default)]
    pub requeue: RequeueConfig,
    /// Diff action deny-lists.
    #[serde(default)]
    pub policy: DiffActionPolicy,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Directory holding the blueprint documents.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

/// Debounce configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Cooldown between two admitted notifications for one blueprint.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Requeue delays and backoff bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequeueConfig {
    /// Delay after a concurrent modification, in milliseconds.
    #[serde(default = "default_conflict_delay_ms")]
    pub conflict_delay_ms: u64,
    /// Delay for self-resolving conditions, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Delay before re-checking an applied diff, in milliseconds.
    #[serde(default = "default_diff_not_empty_delay_ms")]
    pub diff_not_empty_delay_ms: u64,
    /// First backoff delay for propagated errors, in milliseconds.
    #[serde(default = "default_error_backoff_base_ms")]
    pub error_backoff_base_ms: u64,
    /// Upper bound of the error backoff, in seconds.
    #[serde(default = "default_error_backoff_max_secs")]
    pub error_backoff_max_secs: u64,
    /// Substrings marking a missing referenced resource in unknown errors.
    #[serde(default = "default_missing_resource_markers")]
    pub missing_resource_markers: Vec<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            state: StateConfig::default(),
            debounce: DebounceConfig::default(),
            requeue: RequeueConfig::default(),
            policy: DiffActionPolicy::default(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
        }
    }
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            conflict_delay_ms: default_conflict_delay_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            diff_not_empty_delay_ms: default_diff_not_empty_delay_ms(),
            error_backoff_base_ms: default_error_backoff_base_ms(),
            error_backoff_max_secs: default_error_backoff_max_secs(),
            missing_resource_markers: default_missing_resource_markers(),
        }
    }
}

impl DebounceConfig {
    /// Returns the debounce window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl RequeueConfig {
    /// Builds the classifier policy from this section.
    #[must_use]
    pub fn policy(&self) -> RequeuePolicy {
        RequeuePolicy {
            conflict_delay: Duration::from_millis(self.conflict_delay_ms),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            diff_not_empty_delay: Duration::from_millis(self.diff_not_empty_delay_ms),
            missing_resource_markers: self.missing_resource_markers.clone(),
        }
    }

    /// Builds the error backoff from this section.
    #[must_use]
    pub fn backoff(&self) -> ErrorBackoff {
        ErrorBackoff::new(
            Duration::from_millis(self.error_backoff_base_ms),
            Duration::from_secs(self.error_backoff_max_secs),
        )
    }
}

fn default_namespace() -> String {
    String::from("ecosystem")
}

fn default_state_path() -> PathBuf {
    PathBuf::from(crate::state::STATE_DIR)
}

const fn default_window_secs() -> u64 {
    10
}

const fn default_conflict_delay_ms() -> u64 {
    1000
}

const fn default_retry_delay_secs() -> u64 {
    10
}

const fn default_diff_not_empty_delay_ms() -> u64 {
    1000
}

const fn default_error_backoff_base_ms() -> u64 {
    500
}

const fn default_error_backoff_max_secs() -> u64 {
    300
}

fn default_missing_resource_markers() -> Vec<String> {
    DEFAULT_MISSING_RESOURCE_MARKERS
        .iter()
        .map(|m| (*m).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_defaults_match_classifier_defaults() {
        assert_eq!(RequeueConfig::default().policy(), RequeuePolicy::default());
    }

    #[test]
    fn test_debounce_window() {
        let config = DebounceConfig { window_secs: 3 };
        assert_eq!(config.window(), Duration::from_secs(3));
    }
}
