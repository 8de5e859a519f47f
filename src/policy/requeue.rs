//! Error classification into scheduling decisions.
//!
//! After a reconcile pass fails, the classifier decides whether the error is
//! propagated (and retried with the default backoff), whether the blueprint is
//! requeued after a fixed delay, or whether nothing more can be done.

use std::time::Duration;

use tracing::{error, info};

use crate::error::{BlueprintError, ErrorKind};

/// Markers that identify a missing referenced resource in unknown errors.
pub const DEFAULT_MISSING_RESOURCE_MARKERS: &[&str] = &[
    "referenced secret",
    "referenced configmap",
    "referenced config map",
];

/// Delays and markers used by [`RequeueClassifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// Delay after an optimistic-concurrency conflict.
    pub conflict_delay: Duration,
    /// Delay for conditions expected to resolve on their own.
    pub retry_delay: Duration,
    /// Delay before re-checking a diff after applying it.
    pub diff_not_empty_delay: Duration,
    /// Lowercase substrings marking a missing referenced resource.
    pub missing_resource_markers: Vec<String>,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            conflict_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(10),
            diff_not_empty_delay: Duration::from_secs(1),
            missing_resource_markers: DEFAULT_MISSING_RESOURCE_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

/// Scheduling decision for a failed pass.
#[derive(Debug)]
pub enum RequeueDecision {
    /// Propagate the error; the runtime retries with its default backoff.
    ErrorRetry(BlueprintError),
    /// Requeue after the delay without reporting an error.
    RequeueAfter(Duration),
    /// Do not requeue.
    NoFurtherAction,
}

impl RequeueDecision {
    /// Returns the fixed requeue delay, if any.
    #[must_use]
    pub const fn delay(&self) -> Option<Duration> {
        match self {
            Self::RequeueAfter(delay) => Some(*delay),
            Self::ErrorRetry(_) | Self::NoFurtherAction => None,
        }
    }

    /// Returns true if the error is propagated.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::ErrorRetry(_))
    }
}

impl std::fmt::Display for RequeueDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorRetry(err) => write!(f, "retry with backoff ({err})"),
            Self::RequeueAfter(delay) => write!(f, "requeue after {}ms", delay.as_millis()),
            Self::NoFurtherAction => write!(f, "no further action"),
        }
    }
}

/// Maps errors to [`RequeueDecision`]s.
#[derive(Debug, Clone, Default)]
pub struct RequeueClassifier {
    policy: RequeuePolicy,
}

impl RequeueClassifier {
    /// Creates a classifier for the given policy.
    #[must_use]
    pub fn new(mut policy: RequeuePolicy) -> Self {
        for marker in &mut policy.missing_resource_markers {
            *marker = marker.to_lowercase();
        }
        Self { policy }
    }

    /// Returns the policy this classifier applies.
    #[must_use]
    pub const fn policy(&self) -> &RequeuePolicy {
        &self.policy
    }

    /// Classifies the outcome of a reconcile pass.
    pub fn decide(&self, id: &str, err: BlueprintError) -> RequeueDecision {
        let policy = &self.policy;

        match err.kind() {
            ErrorKind::Internal => {
                error!(blueprint = %id, error = %err, "internal error during reconcile, retrying");
                RequeueDecision::ErrorRetry(err)
            }
            ErrorKind::Conflict => {
                info!(blueprint = %id, error = %err, "resource was modified concurrently, requeue");
                RequeueDecision::RequeueAfter(policy.conflict_delay)
            }
            ErrorKind::NotFound { retryable: true } => {
                info!(blueprint = %id, error = %err, "resource not found, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::NotFound { retryable: false } => {
                error!(blueprint = %id, error = %err, "resource not found, giving up");
                RequeueDecision::NoFurtherAction
            }
            ErrorKind::InvalidBlueprint => {
                info!(blueprint = %id, error = %err, "blueprint is invalid, waiting for a new version");
                RequeueDecision::NoFurtherAction
            }
            ErrorKind::Unhealthy => {
                info!(blueprint = %id, error = %err, "ecosystem is unhealthy, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::StateDiffNotEmpty => {
                info!(blueprint = %id, "changes applied, re-checking state diff");
                RequeueDecision::RequeueAfter(policy.diff_not_empty_delay)
            }
            ErrorKind::MultipleBlueprints => {
                error!(blueprint = %id, error = %err, "more than one blueprint found, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::NotUpToDate => {
                info!(blueprint = %id, error = %err, "dependent resources not up to date, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::RestoreInProgress => {
                info!(blueprint = %id, error = %err, "restore in progress, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::Unknown if self.mentions_missing_resource(&err) => {
                info!(blueprint = %id, error = %err, "referenced resource missing, requeue");
                RequeueDecision::RequeueAfter(policy.retry_delay)
            }
            ErrorKind::Unknown => {
                error!(blueprint = %id, error = %err, "unknown error during reconcile, retrying");
                RequeueDecision::ErrorRetry(err)
            }
        }
    }

    fn mentions_missing_resource(&self, err: &BlueprintError) -> bool {
        let message = err.to_string().to_lowercase();
        self.policy
            .missing_resource_markers
            .iter()
            .any(|marker| message.contains(marker.as_str()))
    }
}
