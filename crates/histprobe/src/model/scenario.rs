use crate::model::ErrorInfo;
use serde::{Deserialize, Serialize};

/// Output the driver waits for after a step's input is sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Checkpoint {
    /// The configured prompt marker.
    #[default]
    Prompt,
    /// A literal substring.
    Literal { text: String },
    /// A regular expression.
    Regex { pattern: String },
}

/// One scripted interaction: send a line, then wait for a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Command text; a line terminator is appended when sent.
    pub send: String,
    #[serde(default)]
    pub expect: Checkpoint,
}

impl Step {
    /// A step that runs `command` and waits for the next prompt.
    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            send: command.into(),
            expect: Checkpoint::Prompt,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Clear history, run a succeeding command, a failing command and a
    /// block with no exit status, then force a save.
    pub fn history_exit_duration() -> Self {
        Self {
            name: "history-exit-duration".to_string(),
            description: Some(
                "history records exit codes and durations, including a status-less block"
                    .to_string(),
            ),
            steps: vec![
                Step::command("clear-history", "builtin history clear"),
                Step::command("run-success", "true"),
                Step::command("run-failure", "false"),
                Step::command("run-block", "begin; end"),
                Step::command("save-history", "builtin history save"),
            ],
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::history_exit_duration()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepResult>,
    /// The failure that aborted the scenario, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ScenarioReport {
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }
}
