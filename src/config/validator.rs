//! Validation of the operator configuration.
//!
//! The validator checks every section and collects all problems before
//! reporting, so a broken config file can be fixed in one go.

use crate::domain::Action;
use crate::error::{BlueprintError, ConfigError, Result};
use tracing::{debug, warn};

use super::spec::{OperatorConfig, RequeueConfig};

/// Longest accepted debounce window (one day).
const MAX_DEBOUNCE_WINDOW_SECS: u64 = 86_400;

/// Validator for operator configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an operator configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every problem found.
    pub fn validate(&self, config: &OperatorConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if config.namespace.trim().is_empty() {
            result.error("namespace", "Namespace cannot be empty");
        }

        if config.state.path.as_os_str().is_empty() {
            result.error("state.path", "State path cannot be empty");
        }

        if config.debounce.window_secs == 0 {
            result.error("debounce.window_secs", "Debounce window must be at least 1 second");
        } else if config.debounce.window_secs > MAX_DEBOUNCE_WINDOW_SECS {
            result.error(
                "debounce.window_secs",
                format!("Debounce window must not exceed {MAX_DEBOUNCE_WINDOW_SECS} seconds"),
            );
        }

        Self::validate_requeue(&config.requeue, &mut result);
        Self::validate_policy(config, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            return Ok(result);
        }

        let message = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        let field = result.errors.first().map(|e| e.field.clone());

        Err(BlueprintError::Config(ConfigError::ValidationError { message, field }))
    }

    fn validate_requeue(requeue: &RequeueConfig, result: &mut ValidationResult) {
        let delays = [
            ("requeue.conflict_delay_ms", requeue.conflict_delay_ms),
            ("requeue.retry_delay_secs", requeue.retry_delay_secs),
            ("requeue.diff_not_empty_delay_ms", requeue.diff_not_empty_delay_ms),
            ("requeue.error_backoff_base_ms", requeue.error_backoff_base_ms),
            ("requeue.error_backoff_max_secs", requeue.error_backoff_max_secs),
        ];
        for (field, value) in delays {
            if value == 0 {
                result.error(field, "Delay must be greater than zero");
            }
        }

        if requeue.error_backoff_base_ms > requeue.error_backoff_max_secs.saturating_mul(1000) {
            result.error(
                "requeue.error_backoff_base_ms",
                format!(
                    "Backoff base ({}ms) exceeds the backoff maximum ({}s)",
                    requeue.error_backoff_base_ms, requeue.error_backoff_max_secs
                ),
            );
        }

        if requeue.missing_resource_markers.iter().any(|m| m.trim().is_empty()) {
            result.error(
                "requeue.missing_resource_markers",
                "Markers cannot be empty strings",
            );
        }
    }

    fn validate_policy(config: &OperatorConfig, result: &mut ValidationResult) {
        if config
            .policy
            .denied_dogu_actions
            .contains(&Action::SwitchComponentNamespace)
        {
            result.warnings.push(String::from(
                "policy.denied_dogu_actions lists switch-component-namespace, which never occurs for dogus",
            ));
        }
        if config
            .policy
            .denied_component_actions
            .contains(&Action::SwitchDoguNamespace)
        {
            result.warnings.push(String::from(
                "policy.denied_component_actions lists switch-dogu-namespace, which never occurs for components",
            ));
        }
        if config.policy.denied_dogu_actions.is_empty()
            && config.policy.denied_component_actions.is_empty()
        {
            result
                .warnings
                .push(String::from("No diff actions are denied; downgrades will be applied"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::new()
            .validate(&OperatorConfig::default())
            .expect("defaults should be valid");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_all_problems_are_reported() {
        let mut config = OperatorConfig::default();
        config.debounce.window_secs = 0;
        config.requeue.retry_delay_secs = 0;
        config.requeue.error_backoff_base_ms = 10_000;
        config.requeue.error_backoff_max_secs = 5;

        let err = ConfigValidator::new()
            .validate(&config)
            .expect_err("config should be rejected");

        let message = err.to_string();
        assert!(message.contains("debounce.window_secs"));
        assert!(message.contains("requeue.retry_delay_secs"));
        assert!(message.contains("exceeds the backoff maximum"));
    }

    #[test]
    fn test_oversized_debounce_window_is_rejected() {
        let mut config = OperatorConfig::default();
        config.debounce.window_secs = u64::MAX;

        let err = ConfigValidator::new()
            .validate(&config)
            .expect_err("window should be rejected");

        assert!(err.to_string().contains("must not exceed 86400 seconds"));
    }

    #[test]
    fn test_policy_warnings() {
        let mut config = OperatorConfig::default();
        config.policy.denied_dogu_actions = vec![Action::SwitchComponentNamespace];

        let result = ConfigValidator::new()
            .validate(&config)
            .expect("warnings are not fatal");

        assert_eq!(result.warnings.len(), 1);
    }
}
