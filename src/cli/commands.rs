//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Blueprint lifecycle control engine.
#[derive(Parser, Debug)]
#[command(name = "blueprint-ctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the operator configuration file.
    #[arg(short, long, global = true, env = "BLUEPRINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the actions of a blueprint document against the action policy.
    Validate {
        /// Blueprint document (YAML or JSON).
        file: PathBuf,
    },

    /// Run one dry-run reconcile pass for a blueprint document.
    Evaluate {
        /// Blueprint document (YAML or JSON).
        file: PathBuf,
    },

    /// Show the persisted conditions and events of a blueprint.
    Status {
        /// Blueprint identifier.
        id: String,
    },

    /// Run the controller over blueprint documents for a bounded time.
    Watch {
        /// Blueprint documents to watch.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// How long to run before shutting down.
        #[arg(long, default_value = "30")]
        duration_secs: u64,

        /// Extra notifications sent per blueprint at startup.
        #[arg(long, default_value = "0")]
        burst: usize,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_command() {
        let cli = Cli::try_parse_from([
            "blueprint-ctl",
            "--output",
            "json",
            "watch",
            "a.yaml",
            "b.yaml",
            "--duration-secs",
            "5",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Watch { files, duration_secs, burst } => {
                assert_eq!(files.len(), 2);
                assert_eq!(duration_secs, 5);
                assert_eq!(burst, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_watch_requires_a_file() {
        assert!(Cli::try_parse_from(["blueprint-ctl", "watch"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
