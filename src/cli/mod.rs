//! Command-line interface of `blueprint-ctl`.
//!
//! This module provides the argument definitions and output formatting used
//! to inspect and drive blueprints from a terminal.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
