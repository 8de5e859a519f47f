//! Configuration parser for loading the operator configuration.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{BlueprintError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::OperatorConfig;

/// Environment variable overriding `namespace`.
pub const ENV_NAMESPACE: &str = "BLUEPRINT_NAMESPACE";

/// Environment variable overriding `state.path`.
pub const ENV_STATE_PATH: &str = "BLUEPRINT_STATE_PATH";

/// Environment variable overriding `debounce.window_secs`.
pub const ENV_DEBOUNCE_WINDOW_SECS: &str = "BLUEPRINT_DEBOUNCE_WINDOW_SECS";

/// Configuration parser for loading the operator configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<OperatorConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(BlueprintError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            BlueprintError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<OperatorConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(OperatorConfig::default());
        }

        let config: OperatorConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            BlueprintError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for namespace: {}", config.namespace);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// cannot be interpreted.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<OperatorConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override is not a number.
    pub fn apply_env_overrides(
        config: &mut OperatorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            debug!("Overriding namespace from environment");
            config.namespace = namespace;
        }

        if let Some(path) = lookup(ENV_STATE_PATH) {
            debug!("Overriding state.path from environment");
            config.state.path = PathBuf::from(path);
        }

        if let Some(window) = lookup(ENV_DEBOUNCE_WINDOW_SECS) {
            debug!("Overriding debounce.window_secs from environment");
            config.debounce.window_secs = window.trim().parse().map_err(|_| {
                BlueprintError::Config(ConfigError::InvalidEnvVar {
                    name: ENV_DEBOUNCE_WINDOW_SECS.to_string(),
                    value: window.clone(),
                })
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                BlueprintError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["blueprint-operator.yaml", "blueprint-operator.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(BlueprintError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use std::time::Duration;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = ConfigParser::new()
            .parse_yaml("", None)
            .expect("empty config should parse");

        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.namespace, "ecosystem");
        assert_eq!(config.debounce.window_secs, 10);
        assert_eq!(config.requeue.retry_delay_secs, 10);
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r"
namespace: prod-ecosystem
requeue:
  conflict_delay_ms: 250
policy:
  denied_dogu_actions: [uninstall]
";
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("config should parse");

        assert_eq!(config.namespace, "prod-ecosystem");
        assert_eq!(config.requeue.policy().conflict_delay, Duration::from_millis(250));
        assert_eq!(config.requeue.retry_delay_secs, 10);
        assert_eq!(config.policy.denied_dogu_actions, vec![Action::Uninstall]);
        assert_eq!(
            config.policy.denied_component_actions,
            vec![Action::Downgrade, Action::SwitchComponentNamespace]
        );
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = ConfigParser::new()
            .parse_yaml("debounce: [not, a, map]", None)
            .expect_err("should fail");
        assert!(matches!(err, BlueprintError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = OperatorConfig::default();
        let env = |name: &str| match name {
            ENV_NAMESPACE => Some(String::from("staging")),
            ENV_STATE_PATH => Some(String::from("/var/lib/blueprint")),
            ENV_DEBOUNCE_WINDOW_SECS => Some(String::from(" 30 ")),
            _ => None,
        };

        ConfigParser::apply_env_overrides(&mut config, env).expect("overrides should apply");

        assert_eq!(config.namespace, "staging");
        assert_eq!(config.state.path, PathBuf::from("/var/lib/blueprint"));
        assert_eq!(config.debounce.window_secs, 30);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = OperatorConfig::default();
        let env = |name: &str| (name == ENV_DEBOUNCE_WINDOW_SECS).then(|| String::from("soon"));

        let err = ConfigParser::apply_env_overrides(&mut config, env).expect_err("should fail");

        assert!(matches!(err, BlueprintError::Config(ConfigError::InvalidEnvVar { .. })));
    }

    #[test]
    fn test_find_config_file_searches_parents() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("Failed to create dirs");
        std::fs::write(temp.path().join("blueprint-operator.yaml"), "")
            .expect("Failed to write config");

        let found = find_config_file(&nested).expect("config should be found");

        assert_eq!(found, temp.path().join("blueprint-operator.yaml"));
    }
}
