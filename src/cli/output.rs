//! Output formatting for CLI commands.
//!
//! Every formatter returns the rendered text; the binary decides where it goes.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::controller::ControllerSummary;
use crate::domain::{BlueprintSpec, Condition, ConditionStatus, Conditions, StateDiff};
use crate::error::Result;
use crate::reconciler::{PassOutcome, PassReport};
use crate::state::RecordedEvent;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Condition row for table display.
#[derive(Tabled)]
struct ConditionRow {
    #[tabled(rename = "Type")]
    condition_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Since")]
    since: String,
}

/// Event row for table display.
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    name: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Controller summary row for table display.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Blueprint")]
    blueprint: String,
    #[tabled(rename = "Passes")]
    passes: usize,
    #[tabled(rename = "Failures")]
    failures: usize,
    #[tabled(rename = "Last decision")]
    last_decision: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of the diff action check.
    #[must_use]
    pub fn format_validation(&self, id: &str, diff: &StateDiff, result: &Result<()>) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                blueprint: id,
                valid: result.is_ok(),
                dogu_diffs: diff.dogu_diffs.len(),
                component_diffs: diff.component_diffs.len(),
                config_diffs: diff.config_diffs.len(),
                error: result.as_ref().err().map(ToString::to_string),
            }),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "Blueprint {}: {} dogu, {} component, {} config diffs",
                    id.bold(),
                    diff.dogu_diffs.len(),
                    diff.component_diffs.len(),
                    diff.config_diffs.len()
                );
                match result {
                    Ok(()) => {
                        let _ = writeln!(output, "{} All needed actions are allowed", "✓".green());
                    }
                    Err(err) => {
                        let _ = writeln!(output, "{} {err}", "✗".red());
                    }
                }
                output
            }
        }
    }

    /// Formats the result of a single reconcile pass.
    #[must_use]
    pub fn format_pass(&self, report: &PassReport, spec: Option<&BlueprintSpec>) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PassJson {
                blueprint: &report.blueprint,
                outcome: report.outcome,
                error: report.error.as_deref(),
                decision: report.decision.to_string(),
                conditions: spec.map(|s| &s.conditions),
            }),
            OutputFormat::Text => {
                let mut output = String::new();
                let outcome = match (report.outcome, &report.error) {
                    (Some(PassOutcome::DryRun), _) => "dry run".cyan().to_string(),
                    (Some(PassOutcome::Completed), _) => "completed".green().to_string(),
                    (None, Some(err)) => format!("{} ({err})", "failed".red()),
                    (None, None) => "stopped".yellow().to_string(),
                };
                let _ = writeln!(output, "\nPass for {}: {outcome}", report.blueprint.bold());
                let _ = writeln!(output, "Next: {}", report.decision);

                if let Some(spec) = spec {
                    output.push('\n');
                    output.push_str(&Self::conditions_table(&spec.conditions));
                }
                output
            }
        }
    }

    /// Formats the persisted status of a blueprint.
    #[must_use]
    pub fn format_status(&self, spec: &BlueprintSpec, events: &[RecordedEvent]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&StatusJson {
                blueprint: &spec.id,
                completed: spec.is_completed(),
                conditions: &spec.conditions,
                events,
            }),
            OutputFormat::Text => {
                let mut output = String::new();
                let state = if spec.is_completed() {
                    "completed".green()
                } else {
                    "in progress".yellow()
                };
                let _ = writeln!(output, "\nBlueprint {} ({state})", spec.id.bold());
                let _ = writeln!(
                    output,
                    "   dry run: {}, namespace switch allowed: {}\n",
                    spec.config.dry_run, spec.config.allow_dogu_namespace_switch
                );
                output.push_str(&Self::conditions_table(&spec.conditions));

                if events.is_empty() {
                    return output;
                }

                let rows: Vec<EventRow> = events
                    .iter()
                    .rev()
                    .take(20)
                    .map(|e| EventRow {
                        time: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        name: e.name.clone(),
                        message: truncate(&e.message, 60),
                    })
                    .collect();
                let _ = writeln!(output, "\nRecent events:");
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the statistics of a controller run.
    #[must_use]
    pub fn format_summary(&self, summary: &ControllerSummary) -> String {
        match self.format {
            OutputFormat::Json => to_json(summary),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\nNotifications: {}, debounced: {}",
                    summary.notifications,
                    summary.debounced.to_string().yellow()
                );
                let rows: Vec<SummaryRow> = summary
                    .blueprints
                    .iter()
                    .map(|(id, s)| SummaryRow {
                        blueprint: id.clone(),
                        passes: s.passes,
                        failures: s.failures,
                        last_decision: s.last_decision.clone().unwrap_or_else(|| "-".to_string()),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats a warning line.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": "warning", "message": message })),
            OutputFormat::Text => format!("{} {message}", "⚠".yellow()),
        }
    }

    fn conditions_table(conditions: &Conditions) -> String {
        if conditions.is_empty() {
            return format!("{}\n", "No conditions recorded yet.".dimmed());
        }
        let rows: Vec<ConditionRow> = conditions.iter().map(Self::condition_row).collect();
        let mut table = Table::new(rows).to_string();
        table.push('\n');
        table
    }

    fn condition_row(condition: &Condition) -> ConditionRow {
        let status = match condition.status {
            ConditionStatus::True => "True".green().to_string(),
            ConditionStatus::False => "False".red().to_string(),
            ConditionStatus::Unknown => "Unknown".dimmed().to_string(),
        };
        ConditionRow {
            condition_type: format!("{:?}", condition.condition_type),
            status,
            reason: condition.reason.clone(),
            message: truncate(&condition.message, 50),
            since: condition.last_transition_time.format("%H:%M:%S").to_string(),
        }
    }
}

/// Truncates a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationJson<'a> {
    blueprint: &'a str,
    valid: bool,
    dogu_diffs: usize,
    component_diffs: usize,
    config_diffs: usize,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PassJson<'a> {
    blueprint: &'a str,
    outcome: Option<PassOutcome>,
    error: Option<&'a str>,
    decision: String,
    conditions: Option<&'a Conditions>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusJson<'a> {
    blueprint: &'a str,
    completed: bool,
    conditions: &'a Conditions,
    events: &'a [RecordedEvent],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplyAxis, BlueprintConfig};
    use crate::error::BlueprintError;
    use crate::policy::RequeueDecision;

    fn evaluated_spec() -> BlueprintSpec {
        let mut spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        spec.evaluate_state_diff(ApplyAxis::Dogus, None);
        spec
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long message", 10), "a rathe...");
    }

    #[test]
    fn test_validation_json_reports_error() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let result = Err(BlueprintError::invalid_blueprint("action \"downgrade\" is not allowed"));

        let output = formatter.format_validation("blueprint-1", &StateDiff::default(), &result);
        let json: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        assert_eq!(json["blueprint"], "blueprint-1");
        assert_eq!(json["valid"], false);
        assert!(json["error"].as_str().is_some_and(|e| e.contains("downgrade")));
    }

    #[test]
    fn test_pass_json_includes_decision_and_conditions() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let spec = evaluated_spec();
        let report = PassReport {
            blueprint: "blueprint-1".to_string(),
            outcome: Some(PassOutcome::DryRun),
            error: None,
            decision: RequeueDecision::NoFurtherAction,
        };

        let output = formatter.format_pass(&report, Some(&spec));
        let json: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        assert_eq!(json["outcome"], "dry_run");
        assert_eq!(json["decision"], "no further action");
        assert_eq!(json["conditions"][0]["type"], "DogusApplied");
    }

    #[test]
    fn test_status_text_lists_conditions() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let spec = evaluated_spec();

        let output = formatter.format_status(&spec, &[]);

        assert!(output.contains("blueprint-1"));
        assert!(output.contains("DogusApplied"));
        assert!(!output.contains("Recent events"));
    }

    #[test]
    fn test_summary_text_lists_blueprints() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let mut summary = ControllerSummary::default();
        summary.notifications = 3;
        summary.blueprints.insert("blueprint-1".to_string(), Default::default());

        let output = formatter.format_summary(&summary);

        assert!(output.contains("blueprint-1"));
        assert!(output.contains("Notifications: 3"));
    }
}
