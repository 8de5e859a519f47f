//! Configuration module for the blueprint operator.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `blueprint-operator.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{
    find_config_file, ConfigParser, DEFAULT_CONFIG_FILES, ENV_DEBOUNCE_WINDOW_SECS,
    ENV_NAMESPACE, ENV_STATE_PATH,
};
pub use spec::{DebounceConfig, OperatorConfig, RequeueConfig, StateConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
