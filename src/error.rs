//! Error types for the blueprint lifecycle engine.
//!
//! Every failure a reconcile pass can surface is a variant of [`BlueprintError`].
//! The variants form a closed taxonomy: [`BlueprintError::kind`] maps each of
//! them (including wrapped configuration and persistence errors) onto exactly
//! one [`ErrorKind`], which is what the requeue classifier dispatches on.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the blueprint lifecycle engine.
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// Internal or transient infrastructure error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Optimistic-concurrency conflict while writing a resource.
    #[error("Conflict while updating {resource}: {message}")]
    Conflict {
        /// Resource that was modified concurrently.
        resource: String,
        /// Description of the conflict.
        message: String,
    },

    /// A resource could not be found.
    #[error("Resource not found: {resource}: {message}")]
    NotFound {
        /// Identifier of the missing resource.
        resource: String,
        /// Description of the lookup failure.
        message: String,
        /// Whether a later retry may find the resource again.
        retryable: bool,
    },

    /// The desired-state document is invalid.
    #[error("Blueprint is invalid: {message}")]
    InvalidBlueprint {
        /// Description of every problem found.
        message: String,
    },

    /// The ecosystem does not satisfy a precondition (e.g. unhealthy dogus).
    #[error("Ecosystem is unhealthy: {message}")]
    Unhealthy {
        /// Description of the health problem.
        message: String,
    },

    /// Changes were applied but the state diff has not been re-checked yet.
    #[error("State diff is not empty yet: {message}")]
    StateDiffNotEmpty {
        /// Description of what is still pending.
        message: String,
    },

    /// More than one blueprint resource exists in the ecosystem.
    #[error("Multiple blueprints found, only one is allowed: {}", ids.join(", "))]
    MultipleBlueprints {
        /// Identifiers of all blueprints found.
        ids: Vec<String>,
    },

    /// Dependent resources have not caught up with the desired state yet.
    #[error("Dependent resources are not up to date: {message}")]
    NotUpToDate {
        /// Description of the lagging resources.
        message: String,
    },

    /// A restore is currently running in the ecosystem.
    #[error("Restore in progress: {message}")]
    RestoreInProgress {
        /// Description of the running restore.
        message: String,
    },

    /// Operator configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error of unknown origin, reported by a collaborator as plain text.
    #[error("{0}")]
    Unknown(String),
}

/// Closed classification of every [`BlueprintError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Internal or transient infrastructure error.
    Internal,
    /// Optimistic-concurrency conflict.
    Conflict,
    /// Missing resource.
    NotFound {
        /// Whether the resource may reappear.
        retryable: bool,
    },
    /// Invalid desired-state document.
    InvalidBlueprint,
    /// Ecosystem precondition not met.
    Unhealthy,
    /// Convergence not yet reached after an apply.
    StateDiffNotEmpty,
    /// Operator misconfiguration with several blueprints.
    MultipleBlueprints,
    /// Dependency staging.
    NotUpToDate,
    /// Restore window.
    RestoreInProgress,
    /// Anything else.
    Unknown,
}

/// Operator configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment override could not be interpreted.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The stored blueprint does not exist.
    #[error("Blueprint not found: {id}")]
    NotFound {
        /// Identifier of the missing blueprint.
        id: String,
    },

    /// The blueprint already exists.
    #[error("Blueprint already exists: {id}")]
    AlreadyExists {
        /// Identifier of the existing blueprint.
        id: String,
    },

    /// The stored resource version differs from the one the writer read.
    #[error("Resource version mismatch for {id}: expected {expected}, found {found}")]
    Conflict {
        /// Identifier of the blueprint.
        id: String,
        /// Version the writer based its changes on.
        expected: String,
        /// Version currently stored.
        found: String,
    },

    /// Stored state is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Reading or writing the backend failed.
    #[error("State backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Stored format version is not supported.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected format version.
        expected: String,
        /// Found format version.
        found: String,
    },
}

/// Result type alias for blueprint lifecycle operations.
pub type Result<T> = std::result::Result<T, BlueprintError>;

impl BlueprintError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a not-found error that a retry will not fix.
    #[must_use]
    pub fn not_found_permanent(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an invalid-blueprint error.
    #[must_use]
    pub fn invalid_blueprint(message: impl Into<String>) -> Self {
        Self::InvalidBlueprint {
            message: message.into(),
        }
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Internal(_) | Self::Config(_) | Self::Io(_) => ErrorKind::Internal,
            Self::Conflict { .. } | Self::State(StateError::Conflict { .. }) => ErrorKind::Conflict,
            Self::NotFound { retryable, .. } => ErrorKind::NotFound {
                retryable: *retryable,
            },
            Self::State(StateError::NotFound { .. }) => ErrorKind::NotFound { retryable: false },
            Self::State(_) => ErrorKind::Internal,
            Self::InvalidBlueprint { .. } => ErrorKind::InvalidBlueprint,
            Self::Unhealthy { .. } => ErrorKind::Unhealthy,
            Self::StateDiffNotEmpty { .. } => ErrorKind::StateDiffNotEmpty,
            Self::MultipleBlueprints { .. } => ErrorKind::MultipleBlueprints,
            Self::NotUpToDate { .. } => ErrorKind::NotUpToDate,
            Self::RestoreInProgress { .. } => ErrorKind::RestoreInProgress,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_state_errors_keep_their_kind() {
        let conflict = BlueprintError::State(StateError::Conflict {
            id: String::from("bp"),
            expected: String::from("a"),
            found: String::from("b"),
        });
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let missing = BlueprintError::State(StateError::NotFound {
            id: String::from("bp"),
        });
        assert_eq!(missing.kind(), ErrorKind::NotFound { retryable: false });

        let corrupted = BlueprintError::State(StateError::Corrupted {
            message: String::from("truncated"),
        });
        assert_eq!(corrupted.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_multiple_blueprints_message_lists_ids() {
        let err = BlueprintError::MultipleBlueprints {
            ids: vec![String::from("a"), String::from("b")],
        };
        assert_eq!(
            err.to_string(),
            "Multiple blueprints found, only one is allowed: a, b"
        );
    }
}
