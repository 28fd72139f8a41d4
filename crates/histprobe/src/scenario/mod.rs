//! Scenario loading and execution.
//!
//! Steps run strictly in order. The first failed checkpoint aborts the run
//! and every remaining step is recorded as skipped, so the shell is never
//! driven from an unknown state.

use crate::driver::{compile_safe_regex, Driver, Pattern};
use crate::model::{Checkpoint, Scenario, ScenarioReport, StepResult, StepStatus};
use crate::runner::{HarnessError, HarnessResult};
use std::path::Path;
use std::time::Instant;

/// Load a scenario from a JSON or YAML file, chosen by extension.
pub fn load_scenario(path: &Path) -> HarnessResult<Scenario> {
    let data = std::fs::read_to_string(path).map_err(|err| {
        HarnessError::new(
            crate::model::ErrorCode::Io,
            "failed to read scenario file",
            Some(serde_json::json!({
                "path": path.display().to_string(),
                "source": err.to_string(),
            })),
        )
    })?;
    let scenario = if is_yaml(path) {
        serde_yml::from_str::<Scenario>(&data).map_err(|err| parse_error(path, "yaml", err))?
    } else {
        serde_json::from_str::<Scenario>(&data).map_err(|err| parse_error(path, "json", err))?
    };
    validate_scenario(&scenario)?;
    Ok(scenario)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

fn parse_error(path: &Path, format: &str, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::protocol(
        format!("failed to parse scenario {format}"),
        serde_json::json!({
            "path": path.display().to_string(),
            "parse_error": err.to_string(),
        }),
    )
}

/// Structural checks that serde cannot express.
pub fn validate_scenario(scenario: &Scenario) -> HarnessResult<()> {
    if scenario.steps.is_empty() {
        return Err(HarnessError::protocol(
            "scenario has no steps",
            serde_json::json!({ "scenario": scenario.name }),
        ));
    }
    if let Some(step) = scenario
        .steps
        .iter()
        .find(|step| step.send.contains(['\n', '\r']))
    {
        return Err(HarnessError::protocol(
            "step input must be a single line",
            serde_json::json!({ "step": step.name }),
        ));
    }
    for step in &scenario.steps {
        if let Checkpoint::Regex { pattern } = &step.expect {
            compile_safe_regex(pattern)?;
        }
    }
    Ok(())
}

/// Run `scenario` against a driver whose shell has just been spawned.
///
/// Waits for the initial prompt first. Returns a report in every case; an
/// aborted run carries the error in [`ScenarioReport::error`]. Only invalid
/// checkpoint patterns are returned as `Err`, before anything is sent.
pub fn run_scenario(driver: &mut Driver, scenario: &Scenario) -> HarnessResult<ScenarioReport> {
    // Prompt checkpoints are resolved when reached; their number advances.
    let patterns = scenario
        .steps
        .iter()
        .map(|step| match &step.expect {
            Checkpoint::Prompt => Ok(None),
            other => Pattern::from_checkpoint(other, driver.prompt()).map(Some),
        })
        .collect::<HarnessResult<Vec<_>>>()?;

    let mut report = ScenarioReport {
        name: scenario.name.clone(),
        steps: Vec::with_capacity(scenario.steps.len()),
        error: None,
    };

    if let Err(err) = driver.expect_prompt() {
        tracing::warn!(error = %err, "shell never showed its first prompt");
        report.error = Some(err.to_error_info());
    }

    for (step, pattern) in scenario.steps.iter().zip(&patterns) {
        if report.error.is_some() {
            report.steps.push(StepResult {
                name: step.name.clone(),
                status: StepStatus::Skipped,
                elapsed_ms: 0,
                error: None,
            });
            continue;
        }

        let started = Instant::now();
        tracing::info!(step = %step.name, command = %step.send, "running step");
        let outcome = driver
            .send_line(&step.send)
            .and_then(|()| match pattern {
                Some(pattern) => driver.expect_checkpoint(pattern),
                None => driver.expect_prompt(),
            });
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(_) => report.steps.push(StepResult {
                name: step.name.clone(),
                status: StepStatus::Passed,
                elapsed_ms,
                error: None,
            }),
            Err(err) => {
                tracing::warn!(step = %step.name, error = %err, "step failed; aborting scenario");
                let info = err.to_error_info();
                report.steps.push(StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Failed,
                    elapsed_ms,
                    error: Some(info.clone()),
                });
                report.error = Some(info);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Checkpoint, ErrorCode, Step};

    #[test]
    fn default_scenario_matches_history_exercise() {
        let scenario = Scenario::history_exit_duration();
        let commands: Vec<&str> = scenario.steps.iter().map(|s| s.send.as_str()).collect();
        assert_eq!(
            commands,
            vec![
                "builtin history clear",
                "true",
                "false",
                "begin; end",
                "builtin history save",
            ]
        );
        assert!(scenario
            .steps
            .iter()
            .all(|step| step.expect == Checkpoint::Prompt));
    }

    #[test]
    fn loads_yaml_and_json_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("s.yaml");
        std::fs::write(
            &yaml_path,
            "name: custom\nsteps:\n  - name: echo\n    send: echo hi\n    expect:\n      type: literal\n      text: hi\n  - name: done\n    send: \"true\"\n",
        )
        .unwrap();
        let scenario = load_scenario(&yaml_path).unwrap();
        assert_eq!(scenario.name, "custom");
        assert_eq!(
            scenario.steps.first().map(|s| s.expect.clone()),
            Some(Checkpoint::Literal {
                text: "hi".to_string()
            })
        );
        assert_eq!(
            scenario.steps.get(1).map(|s| s.expect.clone()),
            Some(Checkpoint::Prompt)
        );

        let json_path = dir.path().join("s.json");
        std::fs::write(
            &json_path,
            serde_json::to_vec(&Scenario::history_exit_duration()).unwrap(),
        )
        .unwrap();
        assert_eq!(
            load_scenario(&json_path).unwrap(),
            Scenario::history_exit_duration()
        );
    }

    #[test]
    fn malformed_scenario_file_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"name\": 3}").unwrap();
        assert_eq!(load_scenario(&path).unwrap_err().code, ErrorCode::Protocol);
    }

    #[test]
    fn missing_scenario_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scenario(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Io);
    }

    #[test]
    fn empty_and_multiline_scenarios_are_rejected() {
        let empty = Scenario {
            name: "empty".to_string(),
            description: None,
            steps: Vec::new(),
        };
        assert!(validate_scenario(&empty).is_err());

        let multiline = Scenario {
            name: "multi".to_string(),
            description: None,
            steps: vec![Step::command("two", "true\nfalse")],
        };
        assert!(validate_scenario(&multiline).is_err());
    }
}
