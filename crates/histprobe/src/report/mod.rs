//! Human-readable rendering of harness results.
//!
//! Passing properties print their finding verbatim. Failing properties are
//! printed too, prefixed with `FAIL` and the violated invariant, so a broken
//! log is never reported only by omission.

use crate::model::{
    CleanupStatus, HarnessReport, StepStatus, ValidationOutcome, ValidationReport,
};

/// One line per property, plus warnings for malformed lines.
pub fn validation_lines(report: &ValidationReport) -> Vec<String> {
    match &report.outcome {
        ValidationOutcome::MissingArtifact => vec![format!(
            "ERROR: History file not found: {}",
            report.path.display()
        )],
        ValidationOutcome::UnexpectedFailure { message } => vec![format!("ERROR: {message}")],
        ValidationOutcome::Checked {
            properties,
            malformed,
            ..
        } => {
            let mut lines: Vec<String> = malformed
                .iter()
                .map(|bad| format!("WARN line {}: malformed record: {}", bad.line, bad.reason))
                .collect();
            lines.extend(properties.iter().map(|result| {
                if result.passed {
                    result.message.clone()
                } else {
                    format!("FAIL {}: {}", result.property, result.message)
                }
            }));
            lines
        }
    }
}

/// Full report for a harness run.
pub fn harness_lines(report: &HarnessReport) -> Vec<String> {
    let mut lines = Vec::new();
    for step in &report.scenario.steps {
        match step.status {
            StepStatus::Passed => {}
            StepStatus::Failed => {
                let reason = step
                    .error
                    .as_ref()
                    .map(|err| format!("{}: {}", err.code, err.message))
                    .unwrap_or_default();
                lines.push(format!("ERROR: step {} failed: {reason}", step.name));
            }
            StepStatus::Skipped => lines.push(format!("SKIP step {}", step.name)),
        }
    }
    if let Some(err) = &report.scenario.error {
        if report.scenario.steps.iter().all(|s| s.status != StepStatus::Failed) {
            lines.push(format!("ERROR: {}: {}", err.code, err.message));
        }
    }
    if let Some(validation) = &report.validation {
        lines.extend(validation_lines(validation));
    }
    if let CleanupStatus::Failed { message } = &report.cleanup {
        lines.push(format!("ERROR: cleanup failed: {message}"));
    }
    lines
}
